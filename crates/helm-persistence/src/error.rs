//! Persistence error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The on-disk data was written by an incompatible schema. Fatal:
    /// refusing to start beats silently misreading history.
    #[error("schema version mismatch: store has {found}, binary expects {expected}")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
