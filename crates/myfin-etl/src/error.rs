//! Error types for the sync job
//!
//! Every variant here is fatal to a run. Duplicate-key conflicts are not
//! errors at all; they come back as [`crate::loader::InsertOutcome::Skipped`].

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    /// Required setting missing or unparsable
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    /// Transport-level HTTP failure (DNS, TLS, timeout, connection reset)
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API answered with a non-success status, e.g. 401 for a bad token
    #[error("Transactions API returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// First page did not have the expected `{"response": {...}}` shape
    #[error("Malformed response from transactions API: {0}")]
    MalformedResponse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(
        "Invalid table name '{0}': use lowercase ASCII letters, digits and '_', \
         not starting with a digit, at most 58 characters"
    )]
    InvalidTableName(String),
}

impl EtlError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}
