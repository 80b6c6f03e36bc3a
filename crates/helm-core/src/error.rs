//! Error types for helm-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid pair: {0}")]
    InvalidPair(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
