//! Errors raised by the dataset session.

use queryfx::QueryError;

/// Result alias for session operations.
pub type ReplResult<T> = Result<T, ReplError>;

#[derive(thiserror::Error, Debug)]
pub enum ReplError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Unknown import: {0}")]
    UnknownImport(String),

    #[error("Unknown key type: {0}")]
    UnknownKeyType(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}
