//! Error types for MyFin

use thiserror::Error;

/// Result type alias for MyFin operations
pub type Result<T> = std::result::Result<T, MyfinError>;

/// Main error type for MyFin
#[derive(Error, Debug)]
pub enum MyfinError {
    #[error("Transaction record has no '_id' field and cannot be stored")]
    MissingId,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
