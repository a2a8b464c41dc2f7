//! Top-level orchestrator: decides worker count, builds the
//! shared read-only tables, forks one worker per batch, joins them.
//!
//! Forks OS threads over `std::thread::scope` rather than locking a shared
//! read/result buffer pair: the stride-disjoint schedule guarantees each
//! worker's output indices never overlap another's, so ownership of the
//! write side is provable rather than needing a runtime lock. Each scoped
//! thread borrows the shared reliabilities matrix and a raw pointer into the
//! output buffer; no locking or atomics are needed on the hot path, and
//! scoped threads let the borrow checker prove the read-only side
//! statically. Workers never materialize a `&mut [f64]` over the shared
//! buffer — [`crate::dispatch`]'s worker functions take the raw pointer
//! itself and write through it element-by-element, since several such
//! references would alias across threads even though their writes don't.

use tracing::{debug, instrument};

use crate::capability::{select_width, NativeDetector, Width};
use crate::dispatch::{
    bridge_worker, fill_worker, identical_parallel_worker, identical_series_worker,
    koon_generic_worker, koon_identical_worker, koon_recursive_worker, parallel_worker,
    series_worker, Batch,
};
use crate::error::{RbdError, Result};
use crate::kernels::koon::{NciTable, WorkingSet};

/// Minimum time-instants a single worker is given before another worker is
/// spun up.
const MIN_BATCH: usize = 10_000;

/// A raw-pointer wrapper proving, by construction of the stride-disjoint
/// schedule, that concurrent workers never write the same output index.
/// Each worker's `Batch::batch_index`/`worker_count` pair guarantees its
/// write set `{batch_index*w + i*worker_count*w + lane : i, lane}` is
/// disjoint from every other worker's, for any width `w` either worker
/// chooses — widths only change the stride *within* one worker's own
/// already-disjoint residue class mod `worker_count`. Deliberately exposes
/// only the bare pointer, never a `&mut [f64]` spanning the whole buffer:
/// that would assert exclusive access to the entire range from every thread
/// at once, which several disjoint-but-simultaneous writers violate even
/// when no two writes actually land on the same index.
struct OutputSlice {
    ptr: *mut f64,
    #[allow(dead_code)]
    len: usize,
}

unsafe impl Send for OutputSlice {}
unsafe impl Sync for OutputSlice {}

impl OutputSlice {
    fn ptr(&self) -> *mut f64 {
        self.ptr
    }
}

/// Logs and returns `err`, for use at every fallible return point so
/// structural/configuration errors are surfaced to `tracing` before the
/// caller ever sees them, per SPEC_FULL.md §4.13.
fn log_err(err: RbdError) -> RbdError {
    tracing::debug!(error = %err, "rbd call rejected before dispatch");
    err
}

fn worker_count(t: usize) -> usize {
    let available = num_cpus::get().max(1);
    let by_batch_size = (t + MIN_BATCH - 1) / MIN_BATCH.max(1);
    let mut workers = available.min(by_batch_size.max(1));

    if let Ok(cap) = std::env::var("RBD_MAX_WORKERS") {
        if let Ok(cap) = cap.parse::<usize>() {
            if cap > 0 {
                workers = workers.min(cap);
            }
        }
    }
    workers.max(1)
}

fn detector() -> NativeDetector {
    NativeDetector
}

fn batches(t: usize, worker_count: usize, w_max: Width) -> Vec<Batch> {
    (0..worker_count)
        .map(|batch_index| Batch {
            batch_index,
            worker_count,
            t,
            w_max,
        })
        .collect()
}

fn validate_series_parallel(n: usize, t: usize) -> Result<()> {
    if n == 0 || n > 255 {
        return Err(log_err(RbdError::InvalidTopology {
            n: n as u16,
            k: None,
            t: t as u32,
            reason: "N must be in [1, 255]",
        }));
    }
    Ok(())
}

/// Series topology: `reliabilities` is `N x T` row-major (or `1 x T` for the
/// identical-components path, selected via `identical`).
#[instrument(skip(reliabilities, output))]
pub fn series(reliabilities: &[f64], output: &mut [f64], n: usize, t: usize, identical: bool) -> Result<()> {
    validate_series_parallel(n, t)?;
    let workers = worker_count(t);
    let w_max = select_width(&detector());
    debug!(topology = "series", n, t, workers, w_max = ?w_max, "dispatching");

    let out = OutputSlice { ptr: output.as_mut_ptr(), len: output.len() };
    std::thread::scope(|scope| {
        for batch in batches(t, workers, w_max) {
            let out = &out;
            scope.spawn(move || {
                let output = out.ptr();
                if identical {
                    identical_series_worker(reliabilities, n, output, batch);
                } else {
                    series_worker(reliabilities, n, t, output, batch);
                }
            });
        }
    });
    Ok(())
}

/// Parallel topology.
#[instrument(skip(reliabilities, output))]
pub fn parallel(reliabilities: &[f64], output: &mut [f64], n: usize, t: usize, identical: bool) -> Result<()> {
    validate_series_parallel(n, t)?;
    let workers = worker_count(t);
    let w_max = select_width(&detector());
    debug!(topology = "parallel", n, t, workers, w_max = ?w_max, "dispatching");

    let out = OutputSlice { ptr: output.as_mut_ptr(), len: output.len() };
    std::thread::scope(|scope| {
        for batch in batches(t, workers, w_max) {
            let out = &out;
            scope.spawn(move || {
                let output = out.ptr();
                if identical {
                    identical_parallel_worker(reliabilities, n, output, batch);
                } else {
                    parallel_worker(reliabilities, n, t, output, batch);
                }
            });
        }
    });
    Ok(())
}

/// Bridge topology: `N = 5` implicit.
#[instrument(skip(reliabilities, output))]
pub fn bridge(reliabilities: &[f64], output: &mut [f64], t: usize) -> Result<()> {
    let workers = worker_count(t);
    let w_max = select_width(&detector());
    debug!(topology = "bridge", t, workers, w_max = ?w_max, "dispatching");

    let out = OutputSlice { ptr: output.as_mut_ptr(), len: output.len() };
    std::thread::scope(|scope| {
        for batch in batches(t, workers, w_max) {
            let out = &out;
            scope.spawn(move || {
                let output = out.ptr();
                bridge_worker(reliabilities, t, output, batch);
            });
        }
    });
    Ok(())
}

/// K-out-of-N topology: dispatches the fill worker for the
/// degenerate `K = 0` / `K > N` cases, the identical-closed-form worker when
/// `identical` is set, the recursive-decomposition worker when
/// `use_recursive` is set, and the generic enumerative worker otherwise.
///
/// `strict` (not exposed over the C ABI — see DESIGN.md) turns `K > N` into
/// `RbdError::InvalidTopology` instead of the default "always fails"
/// convention.
#[allow(clippy::too_many_arguments)]
#[instrument(skip(reliabilities, output))]
pub fn koon(
    reliabilities: &[f64],
    output: &mut [f64],
    n: usize,
    k: usize,
    t: usize,
    compute_unreliability: bool,
    use_recursive: bool,
    identical: bool,
    strict: bool,
) -> Result<()> {
    if n == 0 || n > 255 {
        return Err(log_err(RbdError::InvalidTopology {
            n: n as u16,
            k: Some(k as u16),
            t: t as u32,
            reason: "N must be in [1, 255]",
        }));
    }
    if k > n && strict {
        return Err(log_err(RbdError::InvalidTopology {
            n: n as u16,
            k: Some(k as u16),
            t: t as u32,
            reason: "K must not exceed N under strict validation",
        }));
    }

    let workers = worker_count(t);
    let w_max = select_width(&detector());
    debug!(
        topology = "koon", n, k, t, workers, w_max = ?w_max, compute_unreliability, use_recursive, identical,
        "dispatching"
    );

    // Degenerate cases: the block always works (K == 0) or always fails
    // (K > N, non-strict convention). `compute_unreliability` only selects
    // which combinatorial sum would have been used had a sum actually run —
    // it must never change the value itself (§8 invariant 6).
    if k == 0 || k > n {
        let fill_value = if k == 0 { 1.0 } else { 0.0 };
        let out = OutputSlice { ptr: output.as_mut_ptr(), len: output.len() };
        std::thread::scope(|scope| {
            for batch in batches(t, workers, w_max) {
                let out = &out;
                scope.spawn(move || {
                    let output = out.ptr();
                    fill_worker(output, batch, fill_value);
                });
            }
        });
        return Ok(());
    }

    if identical {
        let nci = NciTable::build(n, 0, n).map_err(|e| {
            log_err(match e {
                RbdError::CombinationsOverflow { n, k } => {
                    RbdError::Allocation(format!("nCi table build overflowed at C({n}, {k})"))
                }
                other => other,
            })
        })?;
        let out = OutputSlice { ptr: output.as_mut_ptr(), len: output.len() };
        std::thread::scope(|scope| {
            for batch in batches(t, workers, w_max) {
                let out = &out;
                let nci = &nci;
                scope.spawn(move || {
                    let output = out.ptr();
                    koon_identical_worker(reliabilities, n, k, nci, compute_unreliability, output, batch);
                });
            }
        });
        return Ok(());
    }

    if use_recursive {
        let out = OutputSlice { ptr: output.as_mut_ptr(), len: output.len() };
        std::thread::scope(|scope| {
            for batch in batches(t, workers, w_max) {
                let out = &out;
                scope.spawn(move || {
                    let output = out.ptr();
                    koon_recursive_worker(reliabilities, n, k, t, compute_unreliability, output, batch);
                });
            }
        });
        return Ok(());
    }

    let working = if compute_unreliability {
        WorkingSet::build_fail(n, k)
    } else {
        WorkingSet::build_success(n, k)
    }
    .map_err(|e| {
        log_err(match e {
            RbdError::CombinationsOverflow { n, k } => {
                RbdError::Allocation(format!("combinations table build overflowed at C({n}, {k})"))
            }
            other => other,
        })
    })?;

    let out = OutputSlice { ptr: output.as_mut_ptr(), len: output.len() };
    std::thread::scope(|scope| {
        for batch in batches(t, workers, w_max) {
            let out = &out;
            let working = &working;
            scope.spawn(move || {
                let output = out.ptr();
                koon_generic_worker(reliabilities, n, t, working, compute_unreliability, output, batch);
            });
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_caps_at_available_cores_and_batch_size() {
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(10_000_000) >= 1);
    }

    #[test]
    fn series_orchestrator_produces_capped_output() {
        let n = 3;
        let t = 1000;
        let reliabilities: Vec<f64> = (0..n * t).map(|i| 0.5 + (i as f64 % 10.0) * 0.01).collect();
        let mut output = vec![0.0; t];
        series(&reliabilities, &mut output, n, t, false).unwrap();
        assert!(output.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn koon_degenerate_k_zero_fills_ones() {
        let n = 4;
        let t = 50;
        let reliabilities = vec![0.5; n * t];
        let mut output = vec![-1.0; t];
        koon(&reliabilities, &mut output, n, 0, t, false, false, false, false).unwrap();
        assert!(output.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn koon_degenerate_k_greater_than_n_fills_zeros_by_default() {
        let n = 4;
        let t = 50;
        let reliabilities = vec![0.5; n * t];
        let mut output = vec![-1.0; t];
        koon(&reliabilities, &mut output, n, n + 1, t, false, false, false, false).unwrap();
        assert!(output.iter().all(|&v| v == 0.0));
    }

    /// `compute_unreliability` is only an internal summation-direction
    /// switch; it must never flip the degenerate-case fill value (§8
    /// invariant 6 — both directions yield the same output).
    #[test]
    fn koon_degenerate_fill_value_ignores_compute_unreliability() {
        let n = 4;
        let t = 50;
        let reliabilities = vec![0.5; n * t];

        let mut k0_unreliability = vec![-1.0; t];
        koon(&reliabilities, &mut k0_unreliability, n, 0, t, true, false, false, false).unwrap();
        assert!(k0_unreliability.iter().all(|&v| v == 1.0));

        let mut k_gt_n_unreliability = vec![-1.0; t];
        koon(&reliabilities, &mut k_gt_n_unreliability, n, n + 1, t, true, false, false, false).unwrap();
        assert!(k_gt_n_unreliability.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn koon_degenerate_k_greater_than_n_errors_under_strict() {
        let n = 4;
        let t = 10;
        let reliabilities = vec![0.5; n * t];
        let mut output = vec![0.0; t];
        let result = koon(&reliabilities, &mut output, n, n + 1, t, false, false, false, true);
        assert!(matches!(result, Err(RbdError::InvalidTopology { .. })));
    }

    #[test]
    fn koon_recursive_matches_enumerative_across_the_grid() {
        let n = 5;
        let k = 3;
        let t = 200;
        let reliabilities: Vec<f64> = (0..n)
            .flat_map(|i| (0..t).map(move |j| 0.3 + 0.1 * (i as f64) + 0.0005 * (j as f64)))
            .collect();

        let mut enumerative = vec![0.0; t];
        koon(&reliabilities, &mut enumerative, n, k, t, false, false, false, false).unwrap();

        let mut recursive = vec![0.0; t];
        koon(&reliabilities, &mut recursive, n, k, t, false, true, false, false).unwrap();

        for i in 0..t {
            assert!((enumerative[i] - recursive[i]).abs() < 1e-9, "index {i}");
        }
    }

    #[test]
    fn series_invalid_n_zero_errors() {
        let mut output = vec![0.0; 10];
        let result = series(&[], &mut output, 0, 10, false);
        assert!(matches!(result, Err(RbdError::InvalidTopology { .. })));
    }
}
