//! In-memory store for tests.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use helm_core::{ExecutionReport, LocalOrder, LocalOrderId};
use helm_portfolio::{CashFlowRecord, PortfolioSnapshot, TradeRecord};

use crate::error::StoreResult;
use crate::store::Store;

#[derive(Default)]
struct Inner {
    orders: HashMap<String, LocalOrder>,
    reports: Vec<ExecutionReport>,
    trades: Vec<TradeRecord>,
    cash_flows: Vec<CashFlowRecord>,
    snapshots: Vec<PortfolioSnapshot>,
}

/// `Store` with the same upsert and dedupe semantics as the JSONL store,
/// minus the disk.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every order ever saved, open or terminal. Test helper.
    pub fn all_orders(&self) -> Vec<LocalOrder> {
        let mut orders: Vec<LocalOrder> = self.inner.lock().orders.values().cloned().collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        orders
    }
}

impl Store for MemoryStore {
    fn save_order(&self, order: &LocalOrder) -> StoreResult<()> {
        self.inner
            .lock()
            .orders
            .insert(order.local_id.as_str().to_string(), order.clone());
        Ok(())
    }

    fn get_order(&self, local_id: &LocalOrderId) -> StoreResult<Option<LocalOrder>> {
        Ok(self.inner.lock().orders.get(local_id.as_str()).cloned())
    }

    fn get_order_by_remote_id(&self, remote_id: &str) -> StoreResult<Option<LocalOrder>> {
        Ok(self
            .inner
            .lock()
            .orders
            .values()
            .find(|o| o.remote_id.as_deref() == Some(remote_id))
            .cloned())
    }

    fn get_orders_by_userref(&self, userref: i64) -> StoreResult<Vec<LocalOrder>> {
        let mut orders: Vec<LocalOrder> = self
            .inner
            .lock()
            .orders
            .values()
            .filter(|o| o.userref == Some(userref))
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    fn get_open_orders(&self) -> StoreResult<Vec<LocalOrder>> {
        let mut open: Vec<LocalOrder> = self
            .inner
            .lock()
            .orders
            .values()
            .filter(|o| o.status.is_active())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(open)
    }

    fn save_report(&self, report: &ExecutionReport) -> StoreResult<()> {
        self.inner.lock().reports.push(report.clone());
        Ok(())
    }

    fn get_reports(&self, limit: usize) -> StoreResult<Vec<ExecutionReport>> {
        let inner = self.inner.lock();
        let skip = inner.reports.len().saturating_sub(limit);
        Ok(inner.reports[skip..].to_vec())
    }

    fn save_trade(&self, trade: &TradeRecord) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.trades.iter().all(|t| t.trade_id != trade.trade_id) {
            inner.trades.push(trade.clone());
        }
        Ok(())
    }

    fn get_trades(&self) -> StoreResult<Vec<TradeRecord>> {
        Ok(self.inner.lock().trades.clone())
    }

    fn save_cash_flow(&self, flow: &CashFlowRecord) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.cash_flows.iter().all(|f| f.entry_id != flow.entry_id) {
            inner.cash_flows.push(flow.clone());
        }
        Ok(())
    }

    fn get_cash_flows(&self) -> StoreResult<Vec<CashFlowRecord>> {
        Ok(self.inner.lock().cash_flows.clone())
    }

    fn save_snapshot(&self, snapshot: &PortfolioSnapshot) -> StoreResult<()> {
        self.inner.lock().snapshots.push(snapshot.clone());
        Ok(())
    }

    fn get_snapshots(&self) -> StoreResult<Vec<PortfolioSnapshot>> {
        Ok(self.inner.lock().snapshots.clone())
    }

    fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut inner = self.inner.lock();
        let before = inner.snapshots.len();
        inner.snapshots.retain(|s| s.taken_at >= cutoff);
        Ok(before - inner.snapshots.len())
    }
}
