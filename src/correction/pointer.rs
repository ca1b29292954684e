//! Pointer capability consumed from the host.
//!
//! The engine only ever needs three things from the OS: where the cursor is,
//! a relative nudge and an absolute warp. Everything else about the host input
//! stack stays behind this trait so the correction loop can be driven by a
//! recording double in tests and by the `os-input` backend in the binary.

/// Failures reported by a pointer backend
#[derive(Debug, thiserror::Error)]
pub enum PointerError {
    /// The backend could not be opened (no display, missing permissions, ...)
    #[error("Pointer backend unavailable: {0}")]
    Unavailable(String),

    /// The backend accepted the request but the host rejected it
    #[error("Pointer command failed: {0}")]
    CommandFailed(String),

    /// The thread owning the host handle is gone
    #[error("Pointer backend disconnected")]
    Disconnected,
}

/// Host pointer device.
///
/// Implementations must be cheap to call from the correction loop: a move is
/// fire-and-forget from the engine's point of view, so a backend that talks to
/// a slow API should queue the request and return.
pub trait PointerDevice: Send + Sync + 'static {
    /// Current absolute cursor position
    fn position(&self) -> Result<(i32, i32), PointerError>;

    /// Moves the cursor by an integer relative delta
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), PointerError>;

    /// Warps the cursor to an absolute position
    fn move_to(&self, x: i32, y: i32) -> Result<(), PointerError>;

    /// Short name used in log lines
    fn name(&self) -> &str {
        "pointer"
    }
}
