//! Store errors.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored step JSON could not be encoded or decoded.
    #[error("step json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("migration to v{version} failed: {message}")]
    Migration { version: u32, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored value does not have the expected shape.
    #[error("corrupt value for `{key}`: {value:?}")]
    Corrupt { key: String, value: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The blocking task running a query panicked or the connection mutex
    /// was poisoned.
    #[error("database task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
