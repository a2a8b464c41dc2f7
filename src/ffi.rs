//! `extern "C"` entry points: thin marshalling wrappers that
//! reconstruct slices from raw pointers per the buffer contract and
//! delegate to the safe [`crate::orchestrator`] API, mapping any
//! [`crate::error::RbdError`] to a negative return code.
//!
//! The C ABI always dispatches the generic (non-identical) worker; the
//! identical-components fast path is reachable only through the safe Rust
//! API in [`crate::orchestrator`], which takes an explicit `identical` flag
//! the raw-pointer buffer contract has no room to carry.

use crate::error::RbdError;
use crate::orchestrator;

unsafe fn slice_in(ptr: *const f64, len: usize) -> &'static [f64] {
    std::slice::from_raw_parts(ptr, len)
}

unsafe fn slice_out(ptr: *mut f64, len: usize) -> &'static mut [f64] {
    std::slice::from_raw_parts_mut(ptr, len)
}

fn code(result: Result<(), RbdError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => err.into(),
    }
}

/// # Safety
/// `reliabilities` must point to `n * t` valid, initialized `f64` values,
/// row-major with row stride `t`. `output` must point to `t` valid,
/// writable `f64` slots. Neither may be null. Both must remain valid for
/// the duration of the call; the engine does not retain either pointer
/// afterward.
#[no_mangle]
pub unsafe extern "C" fn rbd_series(
    reliabilities: *const f64,
    output: *mut f64,
    n: u8,
    t: u32,
) -> i32 {
    let n = n as usize;
    let t = t as usize;
    let reliabilities = slice_in(reliabilities, n * t);
    let output = slice_out(output, t);
    code(orchestrator::series(reliabilities, output, n, t, false))
}

/// # Safety
/// Same buffer contract as [`rbd_series`].
#[no_mangle]
pub unsafe extern "C" fn rbd_parallel(
    reliabilities: *const f64,
    output: *mut f64,
    n: u8,
    t: u32,
) -> i32 {
    let n = n as usize;
    let t = t as usize;
    let reliabilities = slice_in(reliabilities, n * t);
    let output = slice_out(output, t);
    code(orchestrator::parallel(reliabilities, output, n, t, false))
}

/// # Safety
/// `reliabilities` must point to `5 * t` valid `f64` values (`N = 5` is
/// implicit for Bridge); otherwise as [`rbd_series`].
#[no_mangle]
pub unsafe extern "C" fn rbd_bridge(reliabilities: *const f64, output: *mut f64, t: u32) -> i32 {
    let t = t as usize;
    let reliabilities = slice_in(reliabilities, crate::kernels::bridge::N * t);
    let output = slice_out(output, t);
    code(orchestrator::bridge(reliabilities, output, t))
}

/// # Safety
/// Same buffer contract as [`rbd_series`]. `use_recursive` selects the
/// recursive decomposition over the generic enumerative sum; both are
/// numerically equivalent up to a few ULP.
#[no_mangle]
pub unsafe extern "C" fn rbd_koon(
    reliabilities: *const f64,
    output: *mut f64,
    n: u8,
    k: u8,
    t: u32,
    compute_unreliability: bool,
    use_recursive: bool,
) -> i32 {
    let n = n as usize;
    let k = k as usize;
    let t = t as usize;
    let reliabilities = slice_in(reliabilities, n * t);
    let output = slice_out(output, t);
    code(orchestrator::koon(
        reliabilities,
        output,
        n,
        k,
        t,
        compute_unreliability,
        use_recursive,
        false,
        false,
    ))
}
