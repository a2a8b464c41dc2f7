//! Reliability Block Diagram (RBD) evaluation engine.
//!
//! Evaluates a reliability curve over a time grid for four canonical block
//! topologies — Series, Parallel, Bridge, and K-out-of-N — batching the
//! time axis across worker threads and, within each worker, across a
//! SIMD-width-generic kernel. See `SPEC_FULL.md` for the full component
//! breakdown; the module layout below mirrors it one-to-one.

pub mod cap;
pub mod capability;
pub mod combinatorics;
pub mod dispatch;
pub mod error;
pub mod ffi;
pub mod kernels;
pub mod orchestrator;
pub mod scratch;

pub use error::{RbdError, Result};
