//! Error types for card-core.

use thiserror::Error;

/// Result type alias using PayloadError.
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Errors that can occur while reading a request body as a card payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid json format: {0}")]
    InvalidJson(String),

    #[error("card payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}
