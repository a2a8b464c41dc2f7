//! K-out-of-N block steps: at least `K` of `N` components must work. Three
//! code paths share this module: the generic enumerative sum over explicit
//! combinations, the identical-components closed form, and the recursive
//! decomposition.

use crate::cap::cap_lanes;
use crate::combinatorics::CombinationsTable;
use crate::kernels::{identical_window, row_window};
use crate::scratch::ScratchArena;

/// Up to `UCHAR_MAX` components.
const MAX_N: usize = 256;

// ---------------------------------------------------------------------
// Generic enumerative path
// ---------------------------------------------------------------------

/// The combinations tables needed for one call's generic-KooN summation:
/// one table per subset size in the active range. For the success
/// direction the range is `K..=N` (every size at which the block is up);
/// for the fail direction it is `0..=K-1`. This materializes the union of
/// per-size tables as a flat, per-size table set rather than one opaque
/// multi-sub-table structure — see DESIGN.md for this convention.
pub struct WorkingSet {
    tables: Vec<CombinationsTable>,
}

impl WorkingSet {
    /// Builds the table set for the success direction: sizes `k..=n`.
    pub fn build_success(n: usize, k: usize) -> crate::error::Result<Self> {
        let mut tables = Vec::with_capacity(n - k + 1);
        for size in k..=n {
            tables.push(CombinationsTable::build(n, size)?);
        }
        Ok(WorkingSet { tables })
    }

    /// Builds the table set for the fail direction: sizes `0..=k-1`.
    pub fn build_fail(n: usize, k: usize) -> crate::error::Result<Self> {
        let mut tables = Vec::with_capacity(k);
        for size in 0..k {
            tables.push(CombinationsTable::build(n, size)?);
        }
        Ok(WorkingSet { tables })
    }
}

/// Generic-success step: sums, over every working-subset combination `C`
/// with `|C| >= K`, `prod_{i in C} r_i * prod_{j notin C} (1 - r_j)`.
#[inline(always)]
pub fn success_step<const W: usize>(
    reliabilities: &[f64],
    n: usize,
    t_stride: usize,
    working: &WorkingSet,
    t0: usize,
) -> [f64; W] {
    cap_lanes(sum_over_tables::<W>(reliabilities, n, t_stride, working, t0))
}

/// Generic-fail step: sums, over every failed-subset combination `C`
/// with `|C| >= N-K+1`, `prod_{i in C}(1-r_i) * prod_{j
/// notin C} r_j`, and returns `cap(1 - sum)`. Equivalently computed here by
/// summing over *working*-subset combinations of size `< K` and returning
/// the complement — see [`WorkingSet::build_fail`]; mathematically
/// identical since a working subset of size `i < K` and its complement
/// (a failed subset of size `N-i > N-K`) describe the same system state.
#[inline(always)]
pub fn fail_step<const W: usize>(
    reliabilities: &[f64],
    n: usize,
    t_stride: usize,
    working: &WorkingSet,
    t0: usize,
) -> [f64; W] {
    let sum = sum_over_tables::<W>(reliabilities, n, t_stride, working, t0);
    let mut out = [0.0f64; W];
    for w in 0..W {
        out[w] = 1.0 - sum[w];
    }
    cap_lanes(out)
}

fn sum_over_tables<const W: usize>(
    reliabilities: &[f64],
    n: usize,
    t_stride: usize,
    working: &WorkingSet,
    t0: usize,
) -> [f64; W] {
    let mut sum = [0.0f64; W];
    let mut in_set = [false; MAX_N];
    for table in &working.tables {
        for combo in table.iter() {
            for &idx in combo {
                in_set[idx] = true;
            }
            let mut term = [1.0f64; W];
            for i in 0..n {
                let row = row_window::<W>(reliabilities, i, t_stride, t0);
                if in_set[i] {
                    for w in 0..W {
                        term[w] *= row[w];
                    }
                } else {
                    for w in 0..W {
                        term[w] *= 1.0 - row[w];
                    }
                }
            }
            for w in 0..W {
                sum[w] += term[w];
            }
            for &idx in combo {
                in_set[idx] = false;
            }
        }
    }
    sum
}

// ---------------------------------------------------------------------
// Identical-components closed form
// ---------------------------------------------------------------------

/// Binomial coefficients `C(N, i)` for `i` in a contiguous index range,
/// built once per call and shared read-only.
pub struct NciTable {
    lo: usize,
    values: Vec<u64>,
}

impl NciTable {
    /// Builds `C(n, i)` for `i in lo..=hi`.
    pub fn build(n: usize, lo: usize, hi: usize) -> crate::error::Result<Self> {
        let mut values = Vec::with_capacity(hi - lo + 1);
        for i in lo..=hi {
            let c = crate::combinatorics::binomial(n as u64, i as u64).ok_or(
                crate::error::RbdError::CombinationsOverflow {
                    n: n as u32,
                    k: i as u32,
                },
            )?;
            values.push(c);
        }
        Ok(NciTable { lo, values })
    }

    pub fn get(&self, i: usize) -> u64 {
        self.values[i - self.lo]
    }
}

/// Identical-components success step: `sum_{i=K..N} C(N,i) r^i (1-r)^{N-i}`,
/// iterating `i` from high to low for consistent summation order across
/// calls.
#[inline(always)]
pub fn identical_success_step<const W: usize>(
    reliabilities: &[f64],
    n: usize,
    k: usize,
    nci: &NciTable,
    t0: usize,
) -> [f64; W] {
    let base = identical_window::<W>(reliabilities, t0);
    let mut result = [0.0f64; W];
    for i in (k..=n).rev() {
        let c = nci.get(i) as f64;
        for w in 0..W {
            result[w] += c * base[w].powi(i as i32) * (1.0 - base[w]).powi((n - i) as i32);
        }
    }
    cap_lanes(result)
}

/// Identical-components unreliability step: `1 -
/// sum_{i=0..K-1} C(N,i) r^i (1-r)^{N-i}`.
#[inline(always)]
pub fn identical_fail_step<const W: usize>(
    reliabilities: &[f64],
    n: usize,
    k: usize,
    nci: &NciTable,
    t0: usize,
) -> [f64; W] {
    let base = identical_window::<W>(reliabilities, t0);
    let mut result = [0.0f64; W];
    for i in (0..k).rev() {
        let c = nci.get(i) as f64;
        for w in 0..W {
            result[w] += c * base[w].powi(i as i32) * (1.0 - base[w]).powi((n - i) as i32);
        }
    }
    let mut out = [0.0f64; W];
    for w in 0..W {
        out[w] = 1.0 - result[w];
    }
    cap_lanes(out)
}

// ---------------------------------------------------------------------
// Recursive decomposition
// ---------------------------------------------------------------------

/// `R_{n,k}`, clamped to the trivial boundary cases a sub-problem can hit:
/// `k <= 0` always succeeds, `k > components.len()` always fails.
fn recurse_bounded<const W: usize>(
    components: &[[f64; W]],
    arena: &mut ScratchArena,
    k: isize,
) -> [f64; W] {
    let n = components.len() as isize;
    if k <= 0 {
        return [1.0; W];
    }
    if k > n {
        return [0.0; W];
    }
    recurse::<W>(components, arena, k as usize)
}

/// `R_{n,k}` for `1 <= k <= n = components.len()`. Pivots on the last
/// component (single-pivot) or a block of the last `best` components
/// (multi-pivot) when that collapses more of the `2^n` leaves.
fn recurse<const W: usize>(
    components: &[[f64; W]],
    arena: &mut ScratchArena,
    k: usize,
) -> [f64; W] {
    let n = components.len();
    if k == n {
        return series_of(components);
    }
    if k == 1 {
        return parallel_of(components);
    }

    let best = (k - 1).min(n - k);
    if best <= 1 {
        let pivot = components[n - 1];
        let rest = &components[..n - 1];
        let r_minus = recurse_bounded::<W>(rest, arena, k as isize - 1);
        let r_same = recurse_bounded::<W>(rest, arena, k as isize);
        let mut out = [0.0f64; W];
        for w in 0..W {
            out[w] = pivot[w] * r_minus[w] + (1.0 - pivot[w]) * r_same[w];
        }
        return out;
    }

    let m = best;
    let pivot_block = &components[n - m..];
    let rest = &components[..n - m];
    for (pos, value) in pivot_block.iter().enumerate() {
        arena.cache_set::<W>(pos, *value);
    }

    let mut p: Vec<[f64; W]> = vec![[0.0f64; W]; m + 1];
    p[0] = all_fail::<W>(arena, m);
    p[m] = all_work::<W>(arena, m);

    let half = (m + 1) / 2; // ceil(m/2)
    for j in 1..half {
        accumulate_pivot_subset_sums::<W>(arena, m, j, &mut p);
    }
    if m % 2 == 0 {
        accumulate_pivot_subset_sums_middle::<W>(arena, m, m / 2, &mut p);
    }

    let mut out = [0.0f64; W];
    for j in 0..=m {
        let r_sub = recurse_bounded::<W>(rest, arena, k as isize - j as isize);
        for w in 0..W {
            out[w] += p[j][w] * r_sub[w];
        }
    }
    out
}

fn series_of<const W: usize>(components: &[[f64; W]]) -> [f64; W] {
    let mut acc = [1.0f64; W];
    for c in components {
        for w in 0..W {
            acc[w] *= c[w];
        }
    }
    crate::cap::cap_lanes(acc)
}

fn parallel_of<const W: usize>(components: &[[f64; W]]) -> [f64; W] {
    let mut acc = [1.0f64; W];
    for c in components {
        for w in 0..W {
            acc[w] *= 1.0 - c[w];
        }
    }
    let mut out = [0.0f64; W];
    for w in 0..W {
        out[w] = 1.0 - acc[w];
    }
    crate::cap::cap_lanes(out)
}

fn all_fail<const W: usize>(arena: &ScratchArena, m: usize) -> [f64; W] {
    let mut acc = [1.0f64; W];
    for pos in 0..m {
        let v = arena.cache_get::<W>(pos);
        for w in 0..W {
            acc[w] *= 1.0 - v[w];
        }
    }
    acc
}

fn all_work<const W: usize>(arena: &ScratchArena, m: usize) -> [f64; W] {
    let mut acc = [1.0f64; W];
    for pos in 0..m {
        let v = arena.cache_get::<W>(pos);
        for w in 0..W {
            acc[w] *= v[w];
        }
    }
    acc
}

/// Computes the size-`j` and size-`(m-j)` pivot-subset sums in one pass over
/// `C(m, j)` subsets of the pivot block. For each size-`j` combination `C`,
/// its own term adds to `p[j]`; the term for `C`'s complement (a
/// size-`(m-j)` working subset) adds to `p[m-j]`, using the same
/// per-position reliabilities with the roles of "working" and "failed"
/// swapped.
fn accumulate_pivot_subset_sums<const W: usize>(
    arena: &mut ScratchArena,
    m: usize,
    j: usize,
    p: &mut [[f64; W]],
) {
    let cache: Vec<[f64; W]> = (0..m).map(|pos| arena.cache_get::<W>(pos)).collect();
    let state = arena.combination_mut(j);
    crate::combinatorics::first_combination(j, state);
    let mut in_set = [false; MAX_N];
    loop {
        for &idx in state.iter() {
            in_set[idx] = true;
        }
        let mut term_j = [1.0f64; W];
        let mut term_complement = [1.0f64; W];
        for pos in 0..m {
            let v = cache[pos];
            if in_set[pos] {
                for w in 0..W {
                    term_j[w] *= v[w];
                    term_complement[w] *= 1.0 - v[w];
                }
            } else {
                for w in 0..W {
                    term_j[w] *= 1.0 - v[w];
                    term_complement[w] *= v[w];
                }
            }
        }
        for w in 0..W {
            p[j][w] += term_j[w];
            p[m - j][w] += term_complement[w];
        }
        for &idx in state.iter() {
            in_set[idx] = false;
        }
        if matches!(
            crate::combinatorics::next_combination(m, j, state),
            crate::combinatorics::Advance::Done
        ) {
            break;
        }
    }
}

/// The `j = m/2` middle term when `m` is even: computed once, not paired
/// with a complement.
fn accumulate_pivot_subset_sums_middle<const W: usize>(
    arena: &mut ScratchArena,
    m: usize,
    j: usize,
    p: &mut [[f64; W]],
) {
    let cache: Vec<[f64; W]> = (0..m).map(|pos| arena.cache_get::<W>(pos)).collect();
    let state = arena.combination_mut(j);
    crate::combinatorics::first_combination(j, state);
    let mut in_set = [false; MAX_N];
    loop {
        for &idx in state.iter() {
            in_set[idx] = true;
        }
        let mut term = [1.0f64; W];
        for pos in 0..m {
            let v = cache[pos];
            if in_set[pos] {
                for w in 0..W {
                    term[w] *= v[w];
                }
            } else {
                for w in 0..W {
                    term[w] *= 1.0 - v[w];
                }
            }
        }
        for w in 0..W {
            p[j][w] += term[w];
        }
        for &idx in state.iter() {
            in_set[idx] = false;
        }
        if matches!(
            crate::combinatorics::next_combination(m, j, state),
            crate::combinatorics::Advance::Done
        ) {
            break;
        }
    }
}

/// Top-level recursive-decomposition step: gathers the `N` per-component
/// reliability windows for this time block and runs the recursion.
#[inline(always)]
pub fn recursive_step<const W: usize>(
    reliabilities: &[f64],
    n: usize,
    t_stride: usize,
    k: usize,
    arena: &mut ScratchArena,
    t0: usize,
) -> [f64; W] {
    let mut components = Vec::with_capacity(n);
    for i in 0..n {
        components.push(row_window::<W>(reliabilities, i, t_stride, t0));
    }
    cap_lanes(recurse_bounded::<W>(&components, arena, k as isize))
}

/// Recursive-decomposition unreliability step: `1 - R_{n, k}` via the same
/// recursion, used when `compute_unreliability` is set together with
/// `use_recursive`.
#[inline(always)]
pub fn recursive_fail_step<const W: usize>(
    reliabilities: &[f64],
    n: usize,
    t_stride: usize,
    k: usize,
    arena: &mut ScratchArena,
    t0: usize,
) -> [f64; W] {
    let mut components = Vec::with_capacity(n);
    for i in 0..n {
        components.push(row_window::<W>(reliabilities, i, t_stride, t0));
    }
    let success = recurse_bounded::<W>(&components, arena, k as isize);
    let mut out = [0.0f64; W];
    for w in 0..W {
        out[w] = 1.0 - success[w];
    }
    cap_lanes(out)
}
