//! The storage contract everything durable goes through.

use chrono::{DateTime, Utc};

use helm_core::{ExecutionReport, LocalOrder, LocalOrderId};
use helm_portfolio::{CashFlowRecord, PortfolioSnapshot, TradeRecord};

use crate::error::StoreResult;

/// Durable storage for orders, reports, ledger inputs, and snapshots.
///
/// Implementations take `&self`: callers share one store behind an `Arc`
/// and the store synchronizes internally. Order saves are upserts keyed
/// by local id; trade and cash-flow saves dedupe on the exchange id, so
/// re-ingesting overlapping history is harmless.
pub trait Store: Send + Sync {
    /// Persist an order's current state. Called on creation and on every
    /// transition, overwriting any prior state for the same local id.
    fn save_order(&self, order: &LocalOrder) -> StoreResult<()>;

    fn get_order(&self, local_id: &LocalOrderId) -> StoreResult<Option<LocalOrder>>;

    /// Look up by exchange order id, for reconciling remote state back
    /// onto local orders.
    fn get_order_by_remote_id(&self, remote_id: &str) -> StoreResult<Option<LocalOrder>>;

    /// Orders tagged with this userref, oldest first. Userrefs identify
    /// strategies rather than individual orders, so several orders can
    /// share one; callers narrow by pair and remote-id state.
    fn get_orders_by_userref(&self, userref: i64) -> StoreResult<Vec<LocalOrder>>;

    /// Orders in a non-terminal state, for rehydration at startup.
    fn get_open_orders(&self) -> StoreResult<Vec<LocalOrder>>;

    fn save_report(&self, report: &ExecutionReport) -> StoreResult<()>;

    /// Most recent reports, newest last, at most `limit`.
    fn get_reports(&self, limit: usize) -> StoreResult<Vec<ExecutionReport>>;

    /// Persist a fill. Duplicate trade ids are silently skipped.
    fn save_trade(&self, trade: &TradeRecord) -> StoreResult<()>;

    fn get_trades(&self) -> StoreResult<Vec<TradeRecord>>;

    /// Persist a deposit/withdrawal/adjustment. Duplicate entry ids are
    /// silently skipped.
    fn save_cash_flow(&self, flow: &CashFlowRecord) -> StoreResult<()>;

    fn get_cash_flows(&self) -> StoreResult<Vec<CashFlowRecord>>;

    fn save_snapshot(&self, snapshot: &PortfolioSnapshot) -> StoreResult<()>;

    fn get_snapshots(&self) -> StoreResult<Vec<PortfolioSnapshot>>;

    /// Drop snapshots taken before `cutoff`. Returns how many were removed.
    fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}
