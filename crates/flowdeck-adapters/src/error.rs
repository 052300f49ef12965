//! Adapter error types.
//!
//! All capability implementations surface errors through [`AdapterError`].
//! Each variant carries enough context to build a user-facing message
//! without inspecting opaque strings.

/// Unified error type for flowdeck OS adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// An I/O operation failed within the adapter.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// A process could not be started at all.
    #[error("failed to start `{program}`: {reason}")]
    SpawnFailed { program: String, reason: String },

    /// A command ran and exited unsuccessfully.
    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// None of the known terminal emulators is installed.
    #[error("No suitable terminal found (tried: {})", .tried.join(", "))]
    NoTerminal { tried: Vec<String> },

    /// The container engine rejected or failed a request.
    #[error("container engine error: {0}")]
    Container(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid input provided to an adapter.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;
