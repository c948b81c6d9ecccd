//! Error types for the rowlens query pipeline.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RowlensError>;

/// Errors raised while translating, executing or resolving an index query.
#[derive(Error, Debug)]
pub enum RowlensError {
    /// The embedded query payload could not be turned into a structured query.
    #[error("Translation error: {0}")]
    Translation(String),

    /// The native index query or its sort could not be built or run.
    #[error("Execution error: {0}")]
    Execution(String),

    /// An aggregate was applied to a column of the wrong type.
    #[error("{0}")]
    TypeMismatch(String),

    /// The row store failed to read or decode a row.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The inverted index failed to apply a write.
    #[error("Index error: {0}")]
    Index(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RowlensError {
    pub fn translation<S: Into<String>>(msg: S) -> Self {
        RowlensError::Translation(msg.into())
    }

    pub fn execution<S: Into<String>>(msg: S) -> Self {
        RowlensError::Execution(msg.into())
    }

    pub fn type_mismatch<S: Into<String>>(msg: S) -> Self {
        RowlensError::TypeMismatch(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        RowlensError::Storage(msg.into())
    }

    pub fn index<S: Into<String>>(msg: S) -> Self {
        RowlensError::Index(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        RowlensError::InvalidConfig(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        RowlensError::InvalidArgument(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        RowlensError::Internal(msg.into())
    }
}
