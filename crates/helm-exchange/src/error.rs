//! Classified exchange errors.

use thiserror::Error;

/// Errors surfaced by the exchange transport.
///
/// Classification drives retry policy: rate limits and outages are
/// transient and retried with backoff, everything else is terminal for
/// the attempt.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Exchange error: {0}")]
    Api(String),
}

impl ExchangeError {
    /// Whether a retry with backoff is worthwhile.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::ServiceUnavailable(_))
    }
}

/// Result type alias for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;
