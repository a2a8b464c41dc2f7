//! Error module for the RBD engine, scoped to what the evaluation engine
//! can actually fail at: structural failures before dispatch. There are no
//! failures during dispatch — workers perform no fallible operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RbdError>;

/// Structural / configuration errors. Numerical pathologies (NaN, negative,
/// out-of-range reliabilities) are never reported here — they're silently
/// clamped by [`crate::cap`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RbdError {
    #[error("invalid topology parameters: N={n}, K={k:?}, T={t}: {reason}")]
    InvalidTopology {
        n: u16,
        k: Option<u16>,
        t: u32,
        reason: &'static str,
    },

    #[error("C({n}, {k}) combinations table would overflow during size computation")]
    CombinationsOverflow { n: u32, k: u32 },

    #[error("allocation failed while building shared table: {0}")]
    Allocation(String),
}

/// FFI boundary convention: 0 = success, negative = failure. Each variant
/// maps to a distinct, stable negative code.
impl From<&RbdError> for i32 {
    fn from(err: &RbdError) -> i32 {
        match err {
            RbdError::InvalidTopology { .. } => -1,
            RbdError::CombinationsOverflow { .. } => -2,
            RbdError::Allocation(_) => -3,
        }
    }
}

impl From<RbdError> for i32 {
    fn from(err: RbdError) -> i32 {
        (&err).into()
    }
}
