//! The order management service.
//!
//! Owns every open order exclusively: one cycle at a time mutates this
//! state, and the store is the source of truth. The in-memory indices
//! are a cache rebuilt from the store at startup, so a crash between a
//! memory mutation and its persist loses nothing.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use helm_core::{
    ExecutionReport, LocalOrder, LocalOrderId, OrderSide, OrderStatus, OrderType, Size,
};
use helm_exchange::{MarketData, RemoteOrder, RemoteOrderStatus};
use helm_persistence::Store;
use helm_risk::{ExecutionPlan, RiskAdjustedAction, RiskStatusSource};

use crate::adapter::ExecutionAdapter;
use crate::config::ExecutionConfig;
use crate::error::ExecutionResult;

/// Numeric strategy tag sent as the order's userref. Stable across runs
/// so reconciliation and PnL attribution survive restarts; bounded to 31
/// bits because exchanges treat userref as a signed 32-bit field.
#[must_use]
pub fn userref_for(strategy: &str) -> i64 {
    let mut hash: u32 = 2_166_136_261;
    for byte in strategy.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    i64::from(hash & 0x7fff_ffff)
}

pub struct ExecutionService {
    adapter: Arc<dyn ExecutionAdapter>,
    store: Arc<dyn Store>,
    market: Arc<dyn MarketData>,
    config: ExecutionConfig,
    /// Working orders by local id.
    orders: HashMap<String, LocalOrder>,
    /// Exchange order id -> local id.
    remote_index: HashMap<String, String>,
}

impl ExecutionService {
    pub fn new(
        adapter: Arc<dyn ExecutionAdapter>,
        store: Arc<dyn Store>,
        market: Arc<dyn MarketData>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            adapter,
            store,
            market,
            config,
            orders: HashMap::new(),
            remote_index: HashMap::new(),
        }
    }

    /// Rebuild the in-memory indices from the store. Called once at
    /// startup, before the first cycle.
    pub fn load_open_orders(&mut self) -> ExecutionResult<usize> {
        let open = self.store.get_open_orders()?;
        for order in open {
            if let Some(remote_id) = &order.remote_id {
                self.remote_index
                    .insert(remote_id.clone(), order.local_id.as_str().to_string());
            }
            self.orders
                .insert(order.local_id.as_str().to_string(), order);
        }
        info!(
            orders = self.orders.len(),
            adapter = self.adapter.name(),
            "rehydrated open orders"
        );
        Ok(self.orders.len())
    }

    /// Orders currently tracked as working.
    pub fn open_orders(&self) -> Vec<&LocalOrder> {
        self.orders.values().collect()
    }

    /// Execute one plan end to end.
    ///
    /// Per-order failures never abort the rest of the plan: a rejected or
    /// errored order is recorded and processing continues. Every order
    /// the plan touched is persisted, guardrail rejections included.
    pub fn execute_plan(
        &mut self,
        plan: &ExecutionPlan,
        risk: &dyn RiskStatusSource,
    ) -> ExecutionResult<ExecutionReport> {
        let mut report = ExecutionReport::begin(plan.plan_id.clone());

        // Eligibility: blocked actions and zero-delta actions never
        // become orders.
        let eligible: Vec<&RiskAdjustedAction> = plan
            .actions
            .iter()
            .filter(|a| a.is_actionable() && !(a.target_size - a.current_size).is_zero())
            .collect();

        debug!(
            plan = %plan.plan_id,
            eligible = eligible.len(),
            dropped = plan.actions.len() - eligible.len(),
            "executing plan"
        );

        let mut orders: Vec<LocalOrder> = eligible
            .iter()
            .map(|action| self.build_order(plan, action))
            .collect();

        if risk.kill_switch_active() {
            // Reject everything without touching the adapter. Cancels
            // remain available through cancel_order/cancel_all.
            warn!(plan = %plan.plan_id, "kill switch active, rejecting plan");
            for order in &mut orders {
                order.reject("kill_switch_active");
                self.store.save_order(order)?;
                report.orders.push(order.clone());
            }
            report
                .errors
                .push("kill_switch_active: plan stopped before submission".to_string());
            report.complete();
            self.store.save_report(&report)?;
            return Ok(report);
        }

        // Concurrency budget counts orders already working.
        let budget = self
            .config
            .max_concurrent_orders
            .saturating_sub(self.orders.len());

        let mut pair_notionals: HashMap<String, Decimal> = HashMap::new();
        let mut total_notional = Decimal::ZERO;

        for (index, mut order) in orders.into_iter().enumerate() {
            if index >= budget {
                order.reject(format!(
                    "max_concurrent_orders exceeded: budget {budget} (limit {})",
                    self.config.max_concurrent_orders
                ));
                self.finish_order(order, &mut report)?;
                continue;
            }

            let price = match self.market.latest_price(&order.pair) {
                Ok(p) => p,
                Err(e) => {
                    order.reject(format!("no price for {}: {e}", order.pair));
                    self.finish_order(order, &mut report)?;
                    continue;
                }
            };
            let notional = order.requested_size.notional(price);

            let pair_total =
                pair_notionals.get(&order.pair.symbol()).copied().unwrap_or(Decimal::ZERO)
                    + notional;
            if pair_total > self.config.max_pair_notional_usd {
                order.reject(format!(
                    "max_pair_notional_usd exceeded: {pair_total} > {}",
                    self.config.max_pair_notional_usd
                ));
                self.finish_order(order, &mut report)?;
                continue;
            }
            if total_notional + notional > self.config.max_total_notional_usd {
                order.reject(format!(
                    "max_total_notional_usd exceeded: {} > {}",
                    total_notional + notional,
                    self.config.max_total_notional_usd
                ));
                self.finish_order(order, &mut report)?;
                continue;
            }
            pair_notionals.insert(order.pair.symbol(), pair_total);
            total_notional += notional;

            if let Err(e) = self.adapter.submit(&mut order) {
                // The adapter already moved the order to a terminal
                // state; record the plan-level error and keep going.
                report.errors.push(format!("{}: {e}", order.local_id));
            }
            self.finish_order(order, &mut report)?;
        }

        report.complete();
        self.store.save_report(&report)?;
        info!(
            plan = %report.plan_id,
            orders = report.orders.len(),
            success = report.success,
            "plan executed"
        );
        Ok(report)
    }

    /// Build the local order for an action: side from the sign of the
    /// size delta, size its magnitude.
    fn build_order(&self, plan: &ExecutionPlan, action: &RiskAdjustedAction) -> LocalOrder {
        let delta = action.target_size - action.current_size;
        let side = if delta.is_positive() {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let mut order = LocalOrder::new(
            plan.plan_id.clone(),
            action.strategies.clone(),
            action.pair.clone(),
            side,
            OrderType::Market,
            delta.abs(),
            None,
        );
        order.userref = Some(userref_for(&action.strategies));
        order
    }

    /// Persist an order's final (for this step) state and index it if
    /// still working.
    fn finish_order(
        &mut self,
        order: LocalOrder,
        report: &mut ExecutionReport,
    ) -> ExecutionResult<()> {
        self.store.save_order(&order)?;
        if let Some(remote_id) = &order.remote_id {
            self.remote_index
                .insert(remote_id.clone(), order.local_id.as_str().to_string());
        }
        if order.status.is_active() {
            self.orders
                .insert(order.local_id.as_str().to_string(), order.clone());
        }
        report.orders.push(order);
        Ok(())
    }

    /// Pull the venue's view and fold it into local state.
    ///
    /// Resolution order: remote-id index, then userref match among
    /// tracked orders still missing a remote id, then store lookup.
    /// Safe to call repeatedly: there is no transaction across
    /// fetch/update/persist, so every step is re-runnable.
    pub fn reconcile_orders(&mut self) -> ExecutionResult<usize> {
        let mut remote = self.adapter.open_orders()?;
        remote.extend(self.adapter.closed_orders()?);

        let mut updated = 0;
        for remote_order in remote {
            if let Some(local) = self.resolve(&remote_order)? {
                self.apply_remote(local, &remote_order)?;
                updated += 1;
            }
        }
        debug!(updated, "reconciled orders");
        Ok(updated)
    }

    fn resolve(&self, remote: &RemoteOrder) -> ExecutionResult<Option<LocalOrder>> {
        if let Some(local_id) = self.remote_index.get(&remote.remote_id) {
            if let Some(order) = self.orders.get(local_id) {
                return Ok(Some(order.clone()));
            }
        }
        if let Some(userref) = remote.userref {
            let matched = self.orders.values().find(|o| {
                o.userref == Some(userref)
                    && o.remote_id.is_none()
                    && remote.pair.as_ref().map_or(true, |p| *p == o.pair)
            });
            if let Some(order) = matched {
                return Ok(Some(order.clone()));
            }
        }
        if let Some(order) = self.store.get_order_by_remote_id(&remote.remote_id)? {
            return Ok(Some(order));
        }
        // An order that went terminal before learning its remote id (e.g.
        // retry exhaustion) is neither tracked nor indexed by remote id;
        // its userref is the last tie back to the venue's record.
        if let Some(userref) = remote.userref {
            let candidates = self.store.get_orders_by_userref(userref)?;
            return Ok(candidates
                .into_iter()
                .rev()
                .find(|o| {
                    o.remote_id.is_none()
                        && o.status != OrderStatus::Rejected
                        && remote.pair.as_ref().map_or(true, |p| *p == o.pair)
                }));
        }
        Ok(None)
    }

    fn apply_remote(
        &mut self,
        mut order: LocalOrder,
        remote: &RemoteOrder,
    ) -> ExecutionResult<()> {
        if order.remote_id.is_none() {
            order.remote_id = Some(remote.remote_id.clone());
        }
        order.record_fill(remote.volume_executed, remote.avg_price);

        let next = match remote.status {
            RemoteOrderStatus::Open => OrderStatus::Open,
            RemoteOrderStatus::Closed => {
                if remote.volume_executed >= remote.volume {
                    OrderStatus::Filled
                } else {
                    OrderStatus::Closed
                }
            }
            RemoteOrderStatus::Canceled => OrderStatus::Canceled,
            RemoteOrderStatus::Expired => OrderStatus::Closed,
        };
        // A pending order can be reported straight as finished; pass
        // through open so the state machine stays honest.
        if order.status == OrderStatus::Pending && next.is_terminal() {
            order.transition(OrderStatus::Open);
        }
        if order.status != next && !order.transition(next) {
            debug!(
                order = %order.local_id,
                from = %order.status,
                to = %next,
                "ignoring illegal remote transition"
            );
        }

        self.store.save_order(&order)?;
        let local_key = order.local_id.as_str().to_string();
        self.remote_index
            .insert(remote.remote_id.clone(), local_key.clone());
        if order.status.is_terminal() {
            self.orders.remove(&local_key);
        } else {
            self.orders.insert(local_key, order);
        }
        Ok(())
    }

    /// Cancel one tracked order. Open orders are canceled at the venue
    /// and marked optimistically; orders never submitted are rejected
    /// locally.
    pub fn cancel_order(&mut self, local_id: &LocalOrderId) -> ExecutionResult<()> {
        let mut order = self
            .orders
            .get(local_id.as_str())
            .cloned()
            .ok_or_else(|| crate::error::ExecutionError::UnknownOrder(local_id.to_string()))?;

        match order.status {
            OrderStatus::Open => {
                self.adapter.cancel(&order)?;
                order.transition(OrderStatus::Canceled);
            }
            OrderStatus::Pending => {
                order.reject("canceled locally before submission");
            }
            _ => {}
        }
        self.store.save_order(&order)?;
        if order.status.is_terminal() {
            self.orders.remove(local_id.as_str());
        }
        info!(order = %local_id, "order canceled");
        Ok(())
    }

    /// Cancel everything. Reconciles first so a fill that landed in the
    /// last moment is recorded as a fill, not erased by the cancel.
    pub fn cancel_all(&mut self) -> ExecutionResult<u32> {
        if let Err(e) = self.reconcile_orders() {
            warn!(error = %e, "pre-cancel reconcile failed, canceling anyway");
        }

        let venue_count = self.adapter.cancel_all()?;

        let mut local_count = 0u32;
        let ids: Vec<String> = self.orders.keys().cloned().collect();
        for id in ids {
            let Some(mut order) = self.orders.remove(&id) else {
                continue;
            };
            match order.status {
                OrderStatus::Open => {
                    order.transition(OrderStatus::Canceled);
                }
                OrderStatus::Pending => {
                    order.reject("canceled in cancel_all");
                }
                _ => {}
            }
            self.store.save_order(&order)?;
            local_count += 1;
        }
        info!(venue = venue_count, local = local_count, "cancel all done");
        Ok(venue_count.max(local_count))
    }
}
