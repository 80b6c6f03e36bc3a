//! Error types for helm-risk.

use thiserror::Error;

/// Risk engine errors.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Invalid risk configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for risk operations.
pub type RiskResult<T> = Result<T, RiskError>;
