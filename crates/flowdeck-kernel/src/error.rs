//! Kernel error types.
//!
//! All kernel subsystems surface errors through [`KernelError`], which is the
//! single error type returned by every public API in this crate.

/// Unified error type for the flowdeck kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    // -- Registry errors ----------------------------------------------------
    /// No handler is registered for the requested channel.
    #[error("no handler registered for channel `{channel}`")]
    HandlerNotFound { channel: String },

    /// The handler ran but reported a failure.
    #[error("handler for channel `{channel}` failed: {reason}")]
    HandlerFailed { channel: String, reason: String },

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors.
    #[error("internal kernel error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;
