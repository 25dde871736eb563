//! Error types for model construction.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building models from external data.
///
/// Only the top-level record can fail; malformed optional fields are
/// replaced by their defaults.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid metadata record: {0}")]
    InvalidRecord(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl ModelError {
    /// Create an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }
}
