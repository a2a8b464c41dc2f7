//! Per-topology worker dispatch: given a batch descriptor and
//! the widest supported vector width, stride across the time axis at
//! `W_max`, descend through narrower widths for the tail, and finish with
//! scalar steps. One dispatch function per topology × direction; each is a
//! thin driver over the width-generic kernels in [`crate::kernels`].
//!
//! `output` is a bare `*mut f64` into the shared output buffer, not a
//! `&mut [f64]`: several workers run against the same buffer concurrently,
//! and while their write sets are index-disjoint by construction (see
//! `crate::orchestrator`), a `&mut [f64]` spanning the *whole* buffer would
//! still assert exclusive access to the whole range from every thread at
//! once. Each worker here writes through the raw pointer one width-sized
//! block at a time, never constructing a Rust reference over more than the
//! handful of lanes it is writing in that instant.

use tracing::trace;

use crate::capability::Width;
use crate::kernels::{bridge, koon, parallel, series};
use crate::scratch::ScratchArena;

/// One worker's share of a call: which batch it owns (`batch_index` of
/// `worker_count`), the grid size `T`, and the widest kernel width its
/// capability selector picked.
#[derive(Debug, Clone, Copy)]
pub struct Batch {
    pub batch_index: usize,
    pub worker_count: usize,
    pub t: usize,
    pub w_max: Width,
}

/// Writes a width-`W` lane group to `output[t0..t0+W]` through the raw
/// pointer. `t0 + W` must not exceed the buffer's length; callers only ever
/// call this at offsets the stride schedule has already bounded against
/// `batch.t`.
#[inline(always)]
unsafe fn write_block<const W: usize>(output: *mut f64, t0: usize, values: [f64; W]) {
    std::ptr::copy_nonoverlapping(values.as_ptr(), output.add(t0), W);
}

/// Writes a single value to `output[t0]` through the raw pointer.
#[inline(always)]
unsafe fn write_one(output: *mut f64, t0: usize, value: f64) {
    *output.add(t0) = value;
}

macro_rules! with_width {
    ($width:expr, $w:ident, $body:block) => {
        match $width {
            Width::W8 => {
                const $w: usize = 8;
                $body
            }
            Width::W4 => {
                const $w: usize = 4;
                $body
            }
            Width::W2 => {
                const $w: usize = 2;
                $body
            }
            Width::Scalar => {
                const $w: usize = 1;
                $body
            }
        }
    };
}

/// Series worker: generic direction, `N` independently-valued components.
pub fn series_worker(reliabilities: &[f64], n: usize, t_stride: usize, output: *mut f64, batch: Batch) {
    trace!(topology = "series", batch_index = batch.batch_index, worker_count = batch.worker_count, w_max = ?batch.w_max, "worker dispatching");
    let w_max = batch.w_max.lanes();
    let mut t = batch.batch_index * w_max;

    while t + w_max <= batch.t {
        with_width!(batch.w_max, W, {
            let out = series::step::<W>(reliabilities, n, t_stride, t);
            unsafe { write_block::<W>(output, t, out) };
        });
        t += batch.worker_count * w_max;
    }
    for w in batch.w_max.tail_descent() {
        let lanes = w.lanes();
        if t + lanes <= batch.t {
            with_width!(w, W, {
                let out = series::step::<W>(reliabilities, n, t_stride, t);
                unsafe { write_block::<W>(output, t, out) };
            });
            t += lanes;
        }
    }
    if t < batch.t {
        let out = series::step::<1>(reliabilities, n, t_stride, t);
        unsafe { write_one(output, t, out[0]) };
    }
}

/// Identical-Series worker: single reliability row raised to the `N`-th
/// power. Runs the alignment prologue first.
pub fn identical_series_worker(reliabilities: &[f64], n: usize, output: *mut f64, batch: Batch) {
    trace!(topology = "identical_series", batch_index = batch.batch_index, worker_count = batch.worker_count, w_max = ?batch.w_max, "worker dispatching");
    let w_max = batch.w_max.lanes();
    let mut t = batch.batch_index * w_max;
    t = align_prologue(reliabilities, output, batch, t, |r, t0| {
        series::identical_step::<1>(r, n, t0)
    });

    while t + w_max <= batch.t {
        with_width!(batch.w_max, W, {
            let out = series::identical_step::<W>(reliabilities, n, t);
            unsafe { write_block::<W>(output, t, out) };
        });
        t += batch.worker_count * w_max;
    }
    for w in batch.w_max.tail_descent() {
        let lanes = w.lanes();
        if t + lanes <= batch.t {
            with_width!(w, W, {
                let out = series::identical_step::<W>(reliabilities, n, t);
                unsafe { write_block::<W>(output, t, out) };
            });
            t += lanes;
        }
    }
    if t < batch.t {
        let out = series::identical_step::<1>(reliabilities, n, t);
        unsafe { write_one(output, t, out[0]) };
    }
}

pub fn parallel_worker(reliabilities: &[f64], n: usize, t_stride: usize, output: *mut f64, batch: Batch) {
    trace!(topology = "parallel", batch_index = batch.batch_index, worker_count = batch.worker_count, w_max = ?batch.w_max, "worker dispatching");
    let w_max = batch.w_max.lanes();
    let mut t = batch.batch_index * w_max;

    while t + w_max <= batch.t {
        with_width!(batch.w_max, W, {
            let out = parallel::step::<W>(reliabilities, n, t_stride, t);
            unsafe { write_block::<W>(output, t, out) };
        });
        t += batch.worker_count * w_max;
    }
    for w in batch.w_max.tail_descent() {
        let lanes = w.lanes();
        if t + lanes <= batch.t {
            with_width!(w, W, {
                let out = parallel::step::<W>(reliabilities, n, t_stride, t);
                unsafe { write_block::<W>(output, t, out) };
            });
            t += lanes;
        }
    }
    if t < batch.t {
        let out = parallel::step::<1>(reliabilities, n, t_stride, t);
        unsafe { write_one(output, t, out[0]) };
    }
}

pub fn identical_parallel_worker(reliabilities: &[f64], n: usize, output: *mut f64, batch: Batch) {
    trace!(topology = "identical_parallel", batch_index = batch.batch_index, worker_count = batch.worker_count, w_max = ?batch.w_max, "worker dispatching");
    let w_max = batch.w_max.lanes();
    let mut t = batch.batch_index * w_max;
    t = align_prologue(reliabilities, output, batch, t, |r, t0| {
        parallel::identical_step::<1>(r, n, t0)
    });

    while t + w_max <= batch.t {
        with_width!(batch.w_max, W, {
            let out = parallel::identical_step::<W>(reliabilities, n, t);
            unsafe { write_block::<W>(output, t, out) };
        });
        t += batch.worker_count * w_max;
    }
    for w in batch.w_max.tail_descent() {
        let lanes = w.lanes();
        if t + lanes <= batch.t {
            with_width!(w, W, {
                let out = parallel::identical_step::<W>(reliabilities, n, t);
                unsafe { write_block::<W>(output, t, out) };
            });
            t += lanes;
        }
    }
    if t < batch.t {
        let out = parallel::identical_step::<1>(reliabilities, n, t);
        unsafe { write_one(output, t, out[0]) };
    }
}

pub fn bridge_worker(reliabilities: &[f64], t_stride: usize, output: *mut f64, batch: Batch) {
    trace!(topology = "bridge", batch_index = batch.batch_index, worker_count = batch.worker_count, w_max = ?batch.w_max, "worker dispatching");
    let w_max = batch.w_max.lanes();
    let mut t = batch.batch_index * w_max;

    while t + w_max <= batch.t {
        with_width!(batch.w_max, W, {
            let out = bridge::step::<W>(reliabilities, t_stride, t);
            unsafe { write_block::<W>(output, t, out) };
        });
        t += batch.worker_count * w_max;
    }
    for w in batch.w_max.tail_descent() {
        let lanes = w.lanes();
        if t + lanes <= batch.t {
            with_width!(w, W, {
                let out = bridge::step::<W>(reliabilities, t_stride, t);
                unsafe { write_block::<W>(output, t, out) };
            });
            t += lanes;
        }
    }
    if t < batch.t {
        let out = bridge::step::<1>(reliabilities, t_stride, t);
        unsafe { write_one(output, t, out[0]) };
    }
}

/// Fill worker for the degenerate KooN cases: stores a
/// constant value across this worker's entire stride-disjoint index set,
/// bypassing the kernel and capability selector entirely.
pub fn fill_worker(output: *mut f64, batch: Batch, value: f64) {
    trace!(topology = "koon_fill", batch_index = batch.batch_index, worker_count = batch.worker_count, value, "worker dispatching");
    let w_max = batch.w_max.lanes().max(1);
    let mut t = batch.batch_index * w_max;
    while t < batch.t {
        let end = (t + w_max).min(batch.t);
        for i in t..end {
            unsafe { write_one(output, i, value) };
        }
        t += batch.worker_count * w_max;
    }
}

/// Generic-direction KooN worker: enumerative sum over the shared
/// [`koon::WorkingSet`].
#[allow(clippy::too_many_arguments)]
pub fn koon_generic_worker(
    reliabilities: &[f64],
    n: usize,
    t_stride: usize,
    working: &koon::WorkingSet,
    compute_unreliability: bool,
    output: *mut f64,
    batch: Batch,
) {
    trace!(topology = "koon_generic", batch_index = batch.batch_index, worker_count = batch.worker_count, w_max = ?batch.w_max, compute_unreliability, "worker dispatching");
    let w_max = batch.w_max.lanes();
    let mut t = batch.batch_index * w_max;

    macro_rules! step_at {
        ($w:ident, $t0:expr) => {
            if compute_unreliability {
                koon::fail_step::<$w>(reliabilities, n, t_stride, working, $t0)
            } else {
                koon::success_step::<$w>(reliabilities, n, t_stride, working, $t0)
            }
        };
    }

    while t + w_max <= batch.t {
        with_width!(batch.w_max, W, {
            let out = step_at!(W, t);
            unsafe { write_block::<W>(output, t, out) };
        });
        t += batch.worker_count * w_max;
    }
    for w in batch.w_max.tail_descent() {
        let lanes = w.lanes();
        if t + lanes <= batch.t {
            with_width!(w, W, {
                let out = step_at!(W, t);
                unsafe { write_block::<W>(output, t, out) };
            });
            t += lanes;
        }
    }
    if t < batch.t {
        let out = step_at!(1, t);
        unsafe { write_one(output, t, out[0]) };
    }
}

/// Identical-direction KooN worker: closed-form sum over the shared
/// [`koon::NciTable`]. Runs the alignment prologue first.
pub fn koon_identical_worker(
    reliabilities: &[f64],
    n: usize,
    k: usize,
    nci: &koon::NciTable,
    compute_unreliability: bool,
    output: *mut f64,
    batch: Batch,
) {
    trace!(topology = "koon_identical", batch_index = batch.batch_index, worker_count = batch.worker_count, w_max = ?batch.w_max, compute_unreliability, "worker dispatching");
    let w_max = batch.w_max.lanes();
    let mut t = batch.batch_index * w_max;
    t = align_prologue(reliabilities, output, batch, t, |r, t0| {
        if compute_unreliability {
            koon::identical_fail_step::<1>(r, n, k, nci, t0)
        } else {
            koon::identical_success_step::<1>(r, n, k, nci, t0)
        }
    });

    macro_rules! step_at {
        ($w:ident, $t0:expr) => {
            if compute_unreliability {
                koon::identical_fail_step::<$w>(reliabilities, n, k, nci, $t0)
            } else {
                koon::identical_success_step::<$w>(reliabilities, n, k, nci, $t0)
            }
        };
    }

    while t + w_max <= batch.t {
        with_width!(batch.w_max, W, {
            let out = step_at!(W, t);
            unsafe { write_block::<W>(output, t, out) };
        });
        t += batch.worker_count * w_max;
    }
    for w in batch.w_max.tail_descent() {
        let lanes = w.lanes();
        if t + lanes <= batch.t {
            with_width!(w, W, {
                let out = step_at!(W, t);
                unsafe { write_block::<W>(output, t, out) };
            });
            t += lanes;
        }
    }
    if t < batch.t {
        let out = step_at!(1, t);
        unsafe { write_one(output, t, out[0]) };
    }
}

/// Recursive-decomposition KooN worker: owns its [`ScratchArena`] for the
/// duration of the batch, one arena per worker, reused across every batch
/// index it processes.
pub fn koon_recursive_worker(
    reliabilities: &[f64],
    n: usize,
    k: usize,
    t_stride: usize,
    compute_unreliability: bool,
    output: *mut f64,
    batch: Batch,
) {
    trace!(topology = "koon_recursive", batch_index = batch.batch_index, worker_count = batch.worker_count, w_max = ?batch.w_max, compute_unreliability, "worker dispatching");
    let mut arena = ScratchArena::new();
    let w_max = batch.w_max.lanes();
    let mut t = batch.batch_index * w_max;

    macro_rules! step_at {
        ($w:ident, $t0:expr) => {
            if compute_unreliability {
                koon::recursive_fail_step::<$w>(reliabilities, n, t_stride, k, &mut arena, $t0)
            } else {
                koon::recursive_step::<$w>(reliabilities, n, t_stride, k, &mut arena, $t0)
            }
        };
    }

    while t + w_max <= batch.t {
        with_width!(batch.w_max, W, {
            let out = step_at!(W, t);
            unsafe { write_block::<W>(output, t, out) };
        });
        t += batch.worker_count * w_max;
    }
    for w in batch.w_max.tail_descent() {
        let lanes = w.lanes();
        if t + lanes <= batch.t {
            with_width!(w, W, {
                let out = step_at!(W, t);
                unsafe { write_block::<W>(output, t, out) };
            });
            t += lanes;
        }
    }
    if t < batch.t {
        let out = step_at!(1, t);
        unsafe { write_one(output, t, out[0]) };
    }
}

/// Runs the identical-topology alignment prologue: if the
/// batch's starting offset into `reliabilities` is not `w_max*8`-byte
/// aligned, burn down through narrower widths (scalar, then `w_max/2`, ...)
/// until it is, or until there is nothing left to align.
fn align_prologue<F>(reliabilities: &[f64], output: *mut f64, batch: Batch, mut t: usize, scalar: F) -> usize
where
    F: Fn(&[f64], usize) -> [f64; 1],
{
    let w_max_bytes = batch.w_max.lanes() * 8;
    if w_max_bytes <= 8 {
        return t;
    }
    let addr = unsafe { reliabilities.as_ptr().add(t) } as usize;
    if addr % w_max_bytes == 0 {
        return t;
    }
    if t < batch.t {
        let out = scalar(reliabilities, t);
        unsafe { write_one(output, t, out[0]) };
        t += 1;
    }
    t
}
