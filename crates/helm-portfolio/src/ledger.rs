//! The portfolio ledger: replay, reconciliation, equity, snapshots.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use helm_core::{OrderSide, Pair, Price};
use helm_exchange::{MarketData, RawBalance};

use crate::position::{AssetBalance, SpotPosition};
use crate::records::{
    CashFlowRecord, PairSnapshot, PortfolioSnapshot, RealizedPnlRecord, TradeRecord,
};

/// Strategy tag used when a trade cannot be attributed to an order.
pub const MANUAL_STRATEGY: &str = "manual";

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Account base currency everything is valued in.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Drift threshold in base-currency value.
    #[serde(default = "default_reconciliation_tolerance")]
    pub reconciliation_tolerance: Decimal,
    /// Snapshot retention window in hours.
    #[serde(default = "default_snapshot_retention_hours")]
    pub snapshot_retention_hours: i64,
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_reconciliation_tolerance() -> Decimal {
    Decimal::ONE
}

fn default_snapshot_retention_hours() -> i64 {
    48
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            reconciliation_tolerance: default_reconciliation_tolerance(),
            snapshot_retention_hours: default_snapshot_retention_hours(),
        }
    }
}

/// Replays trades and cash flows into positions and PnL, rebuilds
/// balances from exchange snapshots, and flags drift between the two.
pub struct PortfolioLedger {
    config: LedgerConfig,
    positions: HashMap<Pair, SpotPosition>,
    balances: HashMap<String, AssetBalance>,
    cash_flows: Vec<CashFlowRecord>,
    realized: Vec<RealizedPnlRecord>,
    realized_total: Decimal,
    seen_trades: HashSet<String>,
    seen_flows: HashSet<String>,
    drift_flag: bool,
    snapshots: Vec<PortfolioSnapshot>,
}

impl PortfolioLedger {
    #[must_use]
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
            balances: HashMap::new(),
            cash_flows: Vec::new(),
            realized: Vec::new(),
            realized_total: Decimal::ZERO,
            seen_trades: HashSet::new(),
            seen_flows: HashSet::new(),
            drift_flag: false,
            snapshots: Vec::new(),
        }
    }

    /// Rebuild positions and PnL from the full ordered history.
    ///
    /// Clears all trade-derived state first, then applies a chronological
    /// merge of both sources. Ties on timestamp keep each source's own
    /// order, with trades ahead of cash flows. Replay is deterministic:
    /// running it twice over the same history produces identical state.
    pub fn replay(&mut self, trades: &[TradeRecord], flows: &[CashFlowRecord]) {
        self.positions.clear();
        self.cash_flows.clear();
        self.realized.clear();
        self.realized_total = Decimal::ZERO;
        self.seen_trades.clear();
        self.seen_flows.clear();

        enum Event<'a> {
            Trade(&'a TradeRecord),
            Flow(&'a CashFlowRecord),
        }

        let mut events: Vec<(chrono::DateTime<Utc>, u8, usize, Event)> = Vec::new();
        for (i, t) in trades.iter().enumerate() {
            events.push((t.executed_at, 0, i, Event::Trade(t)));
        }
        for (i, f) in flows.iter().enumerate() {
            events.push((f.timestamp, 1, i, Event::Flow(f)));
        }
        events.sort_by_key(|(ts, src, idx, _)| (*ts, *src, *idx));

        for (_, _, _, event) in events {
            match event {
                Event::Trade(trade) => {
                    self.apply_trade(trade);
                }
                Event::Flow(flow) => {
                    self.apply_cash_flow(flow);
                }
            }
        }

        info!(
            trades = trades.len(),
            cash_flows = flows.len(),
            positions = self.positions.len(),
            realized_total = %self.realized_total,
            "ledger replay complete"
        );
    }

    /// Ingest one trade. Returns false for duplicates (already applied).
    ///
    /// Buys fold into the weighted-average entry; sells realize PnL and
    /// append an immutable record tagged with the resolved strategy.
    pub fn apply_trade(&mut self, trade: &TradeRecord) -> bool {
        if !self.seen_trades.insert(trade.trade_id.clone()) {
            debug!(trade_id = %trade.trade_id, "duplicate trade ignored");
            return false;
        }

        let position = self
            .positions
            .entry(trade.pair.clone())
            .or_insert_with(|| SpotPosition::new(trade.pair.clone()));

        let rate = trade.rate();
        let fee = trade.fee_quote * rate;

        match trade.side {
            OrderSide::Buy => {
                position.apply_buy(trade.price, trade.volume, fee);
                if position.strategy.is_none() {
                    position.strategy = trade.strategy.clone();
                }
            }
            OrderSide::Sell => {
                let avg_entry = position.avg_entry_price;
                let pnl = position.apply_sell(trade.price, trade.volume, fee, rate);
                self.realized_total += pnl;
                let strategy = trade
                    .strategy
                    .clone()
                    .unwrap_or_else(|| MANUAL_STRATEGY.to_string());
                self.realized.push(RealizedPnlRecord {
                    trade_id: trade.trade_id.clone(),
                    pair: trade.pair.clone(),
                    strategy,
                    volume: trade.volume,
                    price: trade.price,
                    avg_entry_price: avg_entry,
                    fee,
                    pnl,
                    realized_at: trade.executed_at,
                });
            }
        }
        true
    }

    /// Ingest one cash-flow entry. Returns false for duplicates.
    pub fn apply_cash_flow(&mut self, flow: &CashFlowRecord) -> bool {
        if !self.seen_flows.insert(flow.entry_id.clone()) {
            debug!(entry_id = %flow.entry_id, "duplicate cash flow ignored");
            return false;
        }
        self.cash_flows.push(flow.clone());
        true
    }

    /// Rebuild balances wholesale from an exchange snapshot.
    pub fn set_balances(&mut self, live: &[RawBalance]) {
        self.balances.clear();
        for raw in live {
            self.balances.insert(
                raw.asset.clone(),
                AssetBalance {
                    asset: raw.asset.clone(),
                    free: raw.total - raw.hold,
                    reserved: raw.hold,
                    total: raw.total,
                },
            );
        }
    }

    /// Reconcile local positions against exchange balances.
    ///
    /// Rebuilds balances, then compares the per-asset sum of position
    /// sizes against what the exchange holds. A difference worth more
    /// than the configured tolerance sets the drift flag, which the risk
    /// engine reads on the next cycle.
    pub fn reconcile(&mut self, live: &[RawBalance], market: &dyn MarketData) -> bool {
        self.set_balances(live);

        let mut drift = false;
        let mut tracked: HashMap<&str, Decimal> = HashMap::new();
        for position in self.positions.values() {
            *tracked.entry(position.base_asset.as_str()).or_default() +=
                position.size.inner();
        }

        for (asset, local_size) in tracked {
            let live_total = self
                .balances
                .get(asset)
                .map(|b| b.total)
                .unwrap_or(Decimal::ZERO);
            let diff = (live_total - local_size).abs();
            if diff.is_zero() {
                continue;
            }
            let Some(rate) = self.price_in_base(asset, market) else {
                continue;
            };
            let diff_value = diff * rate;
            if diff_value > self.config.reconciliation_tolerance {
                warn!(
                    asset,
                    local = %local_size,
                    live = %live_total,
                    value = %diff_value,
                    tolerance = %self.config.reconciliation_tolerance,
                    "position drift detected"
                );
                drift = true;
            }
        }

        self.drift_flag = drift;
        drift
    }

    /// Base-currency value of one unit of `asset`, if a price exists.
    fn price_in_base(&self, asset: &str, market: &dyn MarketData) -> Option<Decimal> {
        if asset == self.config.base_currency {
            return Some(Decimal::ONE);
        }
        market
            .latest_price(&Pair::new(asset, self.config.base_currency.clone()))
            .ok()
            .map(|p| p.inner())
    }

    /// Total equity: base-currency value of all balances.
    ///
    /// An asset with no obtainable price contributes zero rather than
    /// failing the whole computation.
    pub fn equity(&self, market: &dyn MarketData) -> Decimal {
        self.balances
            .values()
            .map(|b| {
                self.price_in_base(&b.asset, market)
                    .map(|rate| b.total * rate)
                    .unwrap_or(Decimal::ZERO)
            })
            .sum()
    }

    /// Balance of the base currency itself.
    #[must_use]
    pub fn cash(&self) -> Decimal {
        self.balances
            .get(&self.config.base_currency)
            .map(|b| b.total)
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of unrealized PnL across positions, in base currency.
    pub fn unrealized_pnl(&self, market: &dyn MarketData) -> Decimal {
        self.positions
            .values()
            .filter(|p| p.is_open())
            .map(|p| {
                match market.latest_price(&p.pair) {
                    Ok(price) => {
                        let rate = self
                            .price_in_base(&p.quote_asset, market)
                            .unwrap_or(Decimal::ONE);
                        p.unrealized_pnl(price) * rate
                    }
                    // Missing price contributes zero, never an error.
                    Err(_) => Decimal::ZERO,
                }
            })
            .sum()
    }

    /// Base-currency exposure per base asset, from current positions.
    pub fn asset_exposures(&self, market: &dyn MarketData) -> HashMap<String, Decimal> {
        let mut exposures = HashMap::new();
        for position in self.positions.values().filter(|p| p.is_open()) {
            let value = match market.latest_price(&position.pair) {
                Ok(price) => {
                    let rate = self
                        .price_in_base(&position.quote_asset, market)
                        .unwrap_or(Decimal::ONE);
                    position.current_value(price) * rate
                }
                Err(_) => Decimal::ZERO,
            };
            *exposures
                .entry(position.base_asset.clone())
                .or_insert(Decimal::ZERO) += value;
        }
        exposures
    }

    /// Record a snapshot of current totals and prune expired ones.
    pub fn take_snapshot(&mut self, market: &dyn MarketData) -> PortfolioSnapshot {
        let pairs = self
            .positions
            .values()
            .filter(|p| p.is_open())
            .map(|p| {
                let (value, unrealized) = match market.latest_price(&p.pair) {
                    Ok(price) => {
                        let rate = self
                            .price_in_base(&p.quote_asset, market)
                            .unwrap_or(Decimal::ONE);
                        (p.current_value(price) * rate, p.unrealized_pnl(price) * rate)
                    }
                    Err(_) => (Decimal::ZERO, Decimal::ZERO),
                };
                PairSnapshot {
                    pair: p.pair.clone(),
                    size: p.size,
                    avg_entry_price: p.avg_entry_price,
                    value,
                    unrealized_pnl: unrealized,
                }
            })
            .collect();

        let snapshot = PortfolioSnapshot {
            taken_at: Utc::now(),
            equity: self.equity(market),
            cash: self.cash(),
            realized_pnl: self.realized_total,
            unrealized_pnl: self.unrealized_pnl(market),
            pairs,
        };
        self.snapshots.push(snapshot.clone());
        self.prune_snapshots();
        snapshot
    }

    /// Drop snapshots older than the retention window.
    pub fn prune_snapshots(&mut self) {
        let cutoff = Utc::now() - Duration::hours(self.config.snapshot_retention_hours);
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.taken_at >= cutoff);
        let removed = before - self.snapshots.len();
        if removed > 0 {
            debug!(removed, "pruned expired snapshots");
        }
    }

    /// Restore snapshot history (startup rehydration from the store).
    pub fn load_snapshots(&mut self, snapshots: Vec<PortfolioSnapshot>) {
        self.snapshots = snapshots;
        self.prune_snapshots();
    }

    /// Highest equity among snapshots within the trailing window.
    #[must_use]
    pub fn max_equity_within(&self, window: Duration) -> Option<Decimal> {
        let cutoff = Utc::now() - window;
        self.snapshots
            .iter()
            .filter(|s| s.taken_at >= cutoff)
            .map(|s| s.equity)
            .max()
    }

    #[must_use]
    pub fn drift_flag(&self) -> bool {
        self.drift_flag
    }

    #[must_use]
    pub fn position(&self, pair: &Pair) -> Option<&SpotPosition> {
        self.positions.get(pair)
    }

    pub fn positions(&self) -> impl Iterator<Item = &SpotPosition> {
        self.positions.values()
    }

    #[must_use]
    pub fn balances(&self) -> &HashMap<String, AssetBalance> {
        &self.balances
    }

    #[must_use]
    pub fn realized_records(&self) -> &[RealizedPnlRecord] {
        &self.realized
    }

    #[must_use]
    pub fn realized_total(&self) -> Decimal {
        self.realized_total
    }

    #[must_use]
    pub fn cash_flows(&self) -> &[CashFlowRecord] {
        &self.cash_flows
    }

    #[must_use]
    pub fn snapshots(&self) -> &[PortfolioSnapshot] {
        &self.snapshots
    }

    /// Position size for a pair (zero when none tracked).
    #[must_use]
    pub fn position_size(&self, pair: &Pair) -> helm_core::Size {
        self.positions
            .get(pair)
            .map(|p| p.size)
            .unwrap_or(helm_core::Size::ZERO)
    }

    /// Current price of a pair via the market-data provider, if any.
    pub fn pair_price(&self, pair: &Pair, market: &dyn MarketData) -> Option<Price> {
        market.latest_price(pair).ok()
    }
}
