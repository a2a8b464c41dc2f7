//! Lexicographic `nCk` enumeration and the materialized combinations table
//! consumed by the generic KooN path and the KooN recursion's per-call
//! subset expansion.

use crate::error::{RbdError, Result};

/// Writes `0, 1, ..., k-1` into the first `k` entries of `out`.
///
/// `out` must have length `>= k`; only the first `k` entries are touched.
pub fn first_combination(k: usize, out: &mut [usize]) {
    for (i, slot) in out.iter_mut().take(k).enumerate() {
        *slot = i;
    }
}

/// Outcome of [`next_combination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// `state` now holds the next k-subset of `[0, n)`.
    Ok,
    /// `state` held the lexicographically last k-subset; unchanged.
    Done,
}

/// Advances `state` (a strictly increasing `k`-tuple of indices into
/// `[0, n)`) to the next k-subset in lexicographic order.
///
/// `state` must have length `>= k`; only the first `k` entries are read and
/// written. This is the textbook "rightmost incrementable index" algorithm:
/// try the fast path of bumping the last index, and only walk leftward
/// looking for an incrementable index when that index has run off the end
/// of its allowed range.
pub fn next_combination(n: usize, k: usize, state: &mut [usize]) -> Advance {
    if k == 0 {
        return Advance::Done;
    }
    let i0 = k - 1;
    state[i0] += 1;
    if state[i0] < n {
        return Advance::Ok;
    }

    let mut i = i0 as isize;
    while i >= 0 && state[i as usize] >= n + (i as usize) - k {
        i -= 1;
    }
    if i < 0 {
        return Advance::Done;
    }
    let i = i as usize;
    state[i] += 1;
    for j in (i + 1)..k {
        state[j] = state[j - 1] + 1;
    }
    Advance::Ok
}

/// `C(n, k)`, saturating to `None` on overflow rather than panicking —
/// callers treat overflow as the allocation-failure class of structural
/// error.
pub fn binomial(n: u64, k: u64) -> Option<u64> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: u64 = 1;
    for i in 0..k {
        result = result.checked_mul(n - i)?;
        result = result.checked_div(i + 1)?;
    }
    Some(result)
}

/// A materialized table of all `C(n, k)` subsets of `[0, n)`, each a sorted
/// `k`-tuple, laid out contiguously in lexicographic order.
#[derive(Debug, Clone)]
pub struct CombinationsTable {
    n: usize,
    k: usize,
    flat: Vec<usize>,
}

impl CombinationsTable {
    /// Builds the table, enumerating every subset exactly once via
    /// [`first_combination`]/[`next_combination`].
    ///
    /// Fails if `C(n, k) == 0` owing to invalid inputs (`k > n`), or if the
    /// table's flat size would overflow `usize`.
    pub fn build(n: usize, k: usize) -> Result<Self> {
        if k > n {
            return Err(RbdError::CombinationsOverflow {
                n: n as u32,
                k: k as u32,
            });
        }
        let count = binomial(n as u64, k as u64).ok_or(RbdError::CombinationsOverflow {
            n: n as u32,
            k: k as u32,
        })?;
        if count == 0 {
            return Err(RbdError::CombinationsOverflow {
                n: n as u32,
                k: k as u32,
            });
        }
        let flat_len = (count as usize)
            .checked_mul(k)
            .ok_or(RbdError::CombinationsOverflow {
                n: n as u32,
                k: k as u32,
            })?;

        let mut flat = vec![0usize; flat_len];
        let mut state = vec![0usize; k];
        first_combination(k, &mut state);
        let mut written = 0usize;
        loop {
            flat[written * k..(written + 1) * k].copy_from_slice(&state);
            written += 1;
            match next_combination(n, k, &mut state) {
                Advance::Ok => continue,
                Advance::Done => break,
            }
        }
        debug_assert_eq!(written as u64, count);
        Ok(CombinationsTable { n, k, flat })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        if self.k == 0 {
            return 1;
        }
        self.flat.len() / self.k
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `idx`-th subset, as a sorted `k`-tuple of indices into `[0, n)`.
    pub fn get(&self, idx: usize) -> &[usize] {
        &self.flat[idx * self.k..(idx + 1) * self.k]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        (0..self.len()).map(move |i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_combination_is_increasing_prefix() {
        let mut out = [9usize; 5];
        first_combination(3, &mut out);
        assert_eq!(&out[..3], &[0, 1, 2]);
    }

    #[test]
    fn next_combination_terminates_after_c_n_k_minus_one_advances() {
        let (n, k) = (5usize, 3usize);
        let mut state = vec![0usize; k];
        first_combination(k, &mut state);
        let mut advances = 0;
        loop {
            match next_combination(n, k, &mut state) {
                Advance::Ok => advances += 1,
                Advance::Done => break,
            }
        }
        let expected = binomial(n as u64, k as u64).unwrap() as usize;
        assert_eq!(advances, expected - 1);
    }

    /// n=5, k=3 enumerates all 10 tuples in lexicographic order.
    #[test]
    fn enumerates_all_tuples_in_lexicographic_order() {
        let table = CombinationsTable::build(5, 3).unwrap();
        let expected: Vec<[usize; 3]> = vec![
            [0, 1, 2],
            [0, 1, 3],
            [0, 1, 4],
            [0, 2, 3],
            [0, 2, 4],
            [0, 3, 4],
            [1, 2, 3],
            [1, 2, 4],
            [1, 3, 4],
            [2, 3, 4],
        ];
        assert_eq!(table.len(), 10);
        for (got, want) in table.iter().zip(expected.iter()) {
            assert_eq!(got, want);
        }
    }

    #[test]
    fn every_tuple_is_strictly_increasing_and_unique() {
        let table = CombinationsTable::build(6, 3).unwrap();
        let mut seen = std::collections::HashSet::new();
        for tuple in table.iter() {
            for w in tuple.windows(2) {
                assert!(w[0] < w[1]);
            }
            assert!(seen.insert(tuple.to_vec()));
        }
        assert_eq!(table.len(), binomial(6, 3).unwrap() as usize);
    }

    #[test]
    fn invalid_k_greater_than_n_fails() {
        assert!(CombinationsTable::build(3, 5).is_err());
    }

    #[test]
    fn binomial_known_values() {
        assert_eq!(binomial(4, 2), Some(6));
        assert_eq!(binomial(6, 3), Some(20));
        assert_eq!(binomial(0, 0), Some(1));
        assert_eq!(binomial(5, 0), Some(1));
        assert_eq!(binomial(5, 5), Some(1));
    }
}
