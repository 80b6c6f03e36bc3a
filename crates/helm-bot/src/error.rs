//! Application-level error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Risk(#[from] helm_risk::RiskError),

    #[error(transparent)]
    Execution(#[from] helm_execution::ExecutionError),

    #[error(transparent)]
    Store(#[from] helm_persistence::StoreError),

    #[error(transparent)]
    Exchange(#[from] helm_exchange::ExchangeError),
}

pub type AppResult<T> = Result<T, AppError>;
