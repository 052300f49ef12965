//! Engine error types.
//!
//! These never escape [`WorkflowRunner::run_workflow`](crate::WorkflowRunner::run_workflow);
//! they surface through storage adapters and step-definition decoding, and
//! the runner turns them into failed results.

/// Unified error type for the workflow engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A stored step list could not be decoded into command steps.
    #[error("invalid step definition: {0}")]
    InvalidStep(#[from] serde_json::Error),

    /// The storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(#[from] flowdeck_store::StoreError),

    /// An OS capability failed.
    #[error("{0}")]
    Adapter(#[from] flowdeck_adapters::AdapterError),

    /// Catch-all for unexpected internal errors.
    #[error("internal engine error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;
