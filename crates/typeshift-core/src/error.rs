//! Error types for Typeshift

use thiserror::Error;

/// Result type alias for Typeshift operations
pub type TypeshiftResult<T> = Result<T, TypeshiftError>;

/// Main error type for Typeshift
#[derive(Error, Debug)]
pub enum TypeshiftError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TypeshiftError {
    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
