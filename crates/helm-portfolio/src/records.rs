//! Persisted ledger record types.
//!
//! Trades and cash flows are the ledger's inputs; realized-PnL records and
//! snapshots are its append-only outputs. All of them round-trip through
//! the store as JSON.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use helm_core::{OrderSide, Pair, Price, Size};

/// A fill as ingested into the ledger.
///
/// `strategy` is stamped by the ingestion layer, which resolves the
/// trade's parent order via its userref; the ledger itself falls back to
/// `"manual"` for trades it cannot attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Exchange-assigned trade id (dedupe key).
    pub trade_id: String,
    /// Remote id of the parent order, when known.
    pub order_ref: Option<String>,
    pub userref: Option<i64>,
    pub strategy: Option<String>,
    pub pair: Pair,
    pub side: OrderSide,
    pub price: Price,
    pub volume: Size,
    /// Fee in the pair's quote currency.
    pub fee_quote: Decimal,
    /// Conversion rate from the pair's quote currency into the account
    /// base currency at execution time. None means 1:1 (quote == base
    /// currency, the common case). Carried on the record so replay stays
    /// deterministic without a market-data lookup.
    pub quote_rate: Option<Decimal>,
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    /// Conversion rate into the account base currency.
    #[must_use]
    pub fn rate(&self) -> Decimal {
        self.quote_rate.unwrap_or(Decimal::ONE)
    }
}

/// Kind of cash-flow entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashFlowKind {
    Deposit,
    Withdrawal,
    Adjustment,
}

/// Deposit/withdrawal/adjustment entry, keyed by the exchange id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowRecord {
    /// Exchange-assigned entry id (dedupe key).
    pub entry_id: String,
    pub kind: CashFlowKind,
    pub asset: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Realized PnL from one sell-side trade. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedPnlRecord {
    pub trade_id: String,
    pub pair: Pair,
    /// Strategy resolved from the parent order's userref, or `"manual"`.
    pub strategy: String,
    pub volume: Size,
    pub price: Price,
    pub avg_entry_price: Price,
    /// Fee in account base currency.
    pub fee: Decimal,
    /// Realized PnL in account base currency, net of fee.
    pub pnl: Decimal,
    pub realized_at: DateTime<Utc>,
}

/// Per-pair breakdown inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSnapshot {
    pub pair: Pair,
    pub size: Size,
    pub avg_entry_price: Price,
    /// Current value in account base currency (0 if price unavailable).
    pub value: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Point-in-time portfolio totals. Immutable once written; pruned by
/// retention age. Feeds the 24h high-water-mark drawdown calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub taken_at: DateTime<Utc>,
    pub equity: Decimal,
    pub cash: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub pairs: Vec<PairSnapshot>,
}
