//! Error types for the MakerSpace portal core.

use thiserror::Error;

/// Errors that can occur in portal operations.
#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored record could not be interpreted (bad date, time, enum value...).
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Store read failed: {0}")]
    StoreRead(String),

    #[error("Store write failed: {0}")]
    StoreWrite(String),

    #[error("Store request timed out after {0}s")]
    Timeout(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Time conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        PortalError::Serialization(err.to_string())
    }
}

/// Result type alias for portal operations.
pub type PortalResult<T> = Result<T, PortalError>;
