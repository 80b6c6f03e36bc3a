//! Market-data collaborator contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use helm_core::{Pair, PairMetadata, Price, Size};

/// One OHLC bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub start: DateTime<Utc>,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Size,
}

/// Market-data errors.
#[derive(Debug, Clone, Error)]
pub enum MarketDataError {
    /// The feed has a price but it is too old to trade on.
    #[error("Stale data for {pair}: {age_secs}s old")]
    Stale { pair: String, age_secs: u64 },

    #[error("Unknown pair: {0}")]
    UnknownPair(String),

    #[error("Market data unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for market-data operations.
pub type MarketDataResult<T> = Result<T, MarketDataError>;

/// Price and pair-metadata provider.
///
/// The ledger treats a missing price as "contributes zero" rather than a
/// failure; the risk engine treats it as "cannot size, target zero".
pub trait MarketData: Send + Sync {
    fn latest_price(&self, pair: &Pair) -> MarketDataResult<Price>;

    /// Most recent `lookback` bars for `timeframe`, oldest first.
    fn ohlc(&self, pair: &Pair, timeframe: &str, lookback: usize) -> MarketDataResult<Vec<Candle>>;

    fn best_bid_ask(&self, pair: &Pair) -> MarketDataResult<(Price, Price)>;

    fn pair_metadata(&self, pair: &Pair) -> MarketDataResult<PairMetadata>;
}
