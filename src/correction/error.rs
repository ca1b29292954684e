//! Error definitions for the correction engine

use super::pointer::PointerError;
use crate::profiles::Axis;
use thiserror::Error;

/// Errors of the correction engine and its loop.
///
/// Inside the loop every one of these is terminal for that loop instance
/// (fail-stop): it is logged, the loop retires and the next qualifying button
/// press arms a fresh one.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A thread panicked while holding the active-state lock
    #[error("Active state lock poisoned")]
    LockPoisoned,

    /// The computed correction was not a finite number
    #[error("Invalid {axis} correction: {value} (offset {offset}, factor {factor}, sensitivity {sensitivity})")]
    InvalidCorrection {
        axis: Axis,
        value: f64,
        offset: f64,
        factor: f64,
        sensitivity: f64,
    },

    /// The tick interval cannot be slept on
    #[error("Invalid correction interval: {0}s")]
    InvalidInterval(f64),

    /// The host rejected a pointer command
    #[error("Pointer error: {0}")]
    Pointer(#[from] PointerError),

    /// The engine was built outside a tokio runtime
    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}
