//! Exchange client trait and wire types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use helm_core::{OrderSide, OrderType, Pair, Price, Size};

use crate::error::ExchangeResult;

/// Order submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub pair: Pair,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub volume: Size,
    /// Limit price; None for market orders.
    pub price: Option<Price>,
    /// Numeric strategy tag echoed back on fills.
    pub userref: Option<i64>,
    /// Dry-run flag: the exchange validates without placing.
    pub validate: bool,
}

/// Response to an order submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    /// Exchange-assigned transaction id. Absent on validate-only calls;
    /// absent on a live call means the response is malformed.
    pub txid: Option<String>,
    /// Human-readable order description from the exchange.
    pub description: Option<String>,
    /// Raw response body kept for audit.
    pub raw: serde_json::Value,
}

/// Exchange-side view of an order's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteOrderStatus {
    Open,
    Closed,
    Canceled,
    Expired,
}

/// An order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub remote_id: String,
    pub userref: Option<i64>,
    pub pair: Option<Pair>,
    pub status: RemoteOrderStatus,
    pub volume: Size,
    pub volume_executed: Size,
    pub avg_price: Option<Price>,
}

/// A fill reported by the exchange trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrade {
    /// Exchange-assigned trade id (dedupe key).
    pub trade_id: String,
    /// Remote id of the parent order.
    pub order_id: String,
    pub pair: Pair,
    pub side: OrderSide,
    pub price: Price,
    pub volume: Size,
    /// Fee in the pair's quote currency.
    pub fee: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Kind of cash-flow ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryKind {
    Deposit,
    Withdrawal,
    Adjustment,
}

/// Cash-flow entry from the exchange ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Exchange-assigned entry id (dedupe key).
    pub entry_id: String,
    pub kind: LedgerEntryKind,
    pub asset: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Balance snapshot for one asset as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBalance {
    pub asset: String,
    pub total: Decimal,
    /// Amount reserved by open orders.
    pub hold: Decimal,
}

/// Signed exchange transport.
///
/// All calls share one rate-limiter budget per credential set; the
/// implementation blocks the caller rather than failing fast when the
/// budget is exhausted. Every error is one of the classified
/// `ExchangeError` variants.
pub trait ExchangeClient: Send + Sync {
    fn submit_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse>;

    fn cancel_order(&self, remote_id: &str) -> ExchangeResult<()>;

    fn cancel_all(&self) -> ExchangeResult<u32>;

    /// Dead-man switch: cancel everything if no further call arrives
    /// within `seconds`. Refreshed before each live submission.
    fn cancel_all_orders_after(&self, seconds: u32) -> ExchangeResult<()>;

    fn get_open_orders(&self, userref: Option<i64>) -> ExchangeResult<Vec<RemoteOrder>>;

    fn get_closed_orders(&self) -> ExchangeResult<Vec<RemoteOrder>>;

    fn get_balances(&self) -> ExchangeResult<Vec<RawBalance>>;

    fn get_trades_history(&self) -> ExchangeResult<Vec<RemoteTrade>>;

    fn get_ledger_entries(&self) -> ExchangeResult<Vec<LedgerEntry>>;
}
