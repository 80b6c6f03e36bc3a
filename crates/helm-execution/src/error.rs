//! Execution error types.

use thiserror::Error;

use helm_exchange::{ExchangeError, MarketDataError};
use helm_persistence::StoreError;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    /// Success response that cannot be acted on (e.g. no transaction id).
    #[error("Malformed exchange response: {0}")]
    MalformedResponse(String),

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    #[error("Invalid execution config: {0}")]
    InvalidConfig(String),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
