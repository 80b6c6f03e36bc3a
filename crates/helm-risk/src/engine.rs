//! The risk engine: intents in, bounded actions out.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use helm_core::{IntentKind, Pair, Price, Size, StrategyIntent};
use helm_exchange::MarketData;

use crate::atr::average_true_range;
use crate::config::{RiskLimits, DUST_FLOOR_USD, HYSTERESIS_USD};
use crate::context::RiskContext;
use crate::kill_switch::{KillReason, KillSwitch, RiskStatus};

/// What the OMS should do with a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Open,
    Increase,
    Reduce,
    Close,
    None,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Increase => "increase",
            Self::Reduce => "reduce",
            Self::Close => "close",
            Self::None => "none",
        };
        write!(f, "{s}")
    }
}

/// One pair's risk-adjusted target for this cycle.
///
/// Created once per pair per cycle, consumed once by the execution
/// service, never mutated afterward. Carries the full limit snapshot it
/// was computed under, for audit and replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAdjustedAction {
    pub pair: Pair,
    /// Contributing strategy ids, comma-joined when aggregated.
    pub strategies: String,
    pub kind: ActionKind,
    /// Target base size after all clamps.
    pub target_size: Size,
    /// Target notional in base currency after all clamps.
    pub target_notional: Decimal,
    /// Position size as of the last ledger sync.
    pub current_size: Size,
    pub reason: String,
    pub blocked: bool,
    pub blocked_reasons: Vec<String>,
    /// Limits in force when this action was computed.
    pub limits: RiskLimits,
}

impl RiskAdjustedAction {
    /// Whether the OMS should act on this at all.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        !self.blocked && self.kind != ActionKind::None
    }
}

/// One cycle's worth of actions, in deterministic pair order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub plan_id: String,
    pub generated_at: DateTime<Utc>,
    pub actions: Vec<RiskAdjustedAction>,
    pub metadata: serde_json::Value,
}

impl ExecutionPlan {
    fn generate_id() -> String {
        let ts = Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        format!("plan_{ts}_{uuid_short}")
    }
}

/// Converts strategy intents into clamped, kill-switch-aware actions.
pub struct RiskEngine {
    limits: RiskLimits,
    kill_switch: Arc<KillSwitch>,
}

impl RiskEngine {
    #[must_use]
    pub fn new(limits: RiskLimits, kill_switch: Arc<KillSwitch>) -> Self {
        Self {
            limits,
            kill_switch,
        }
    }

    #[must_use]
    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Compute kill-switch state for this cycle. Reasons are additive:
    /// every simultaneous cause is recorded.
    pub fn evaluate_status(&self, ctx: &RiskContext) -> RiskStatus {
        let mut reasons = Vec::new();
        if self.kill_switch.is_engaged() {
            reasons.push(KillReason::ManualOverride);
        }
        if ctx.daily_drawdown_pct > self.limits.max_daily_drawdown_pct {
            reasons.push(KillReason::DrawdownExceeded {
                current_pct: ctx.daily_drawdown_pct,
                max_pct: self.limits.max_daily_drawdown_pct,
            });
        }
        if ctx.drift_flag && self.limits.kill_switch_on_drift {
            reasons.push(KillReason::Drift);
        }
        RiskStatus { reasons }
    }

    /// Process one cycle's intents into actions, one per pair.
    pub fn process(
        &self,
        intents: &[StrategyIntent],
        ctx: &RiskContext,
        market: &dyn MarketData,
    ) -> Vec<RiskAdjustedAction> {
        let status = self.evaluate_status(ctx);
        if status.active() {
            warn!(reasons = %status.describe(), "kill switch active this cycle");
        }

        // BTreeMap keeps pair order deterministic, which also fixes the
        // truncation order downstream.
        let mut by_pair: BTreeMap<Pair, Vec<&StrategyIntent>> = BTreeMap::new();
        for intent in intents {
            by_pair.entry(intent.pair.clone()).or_default().push(intent);
        }

        let mut actions = Vec::with_capacity(by_pair.len());
        for (pair, group) in by_pair {
            actions.push(self.process_pair(pair, &group, ctx, market, &status));
        }
        actions
    }

    /// Process a cycle and wrap the result in a plan.
    pub fn build_plan(
        &self,
        intents: &[StrategyIntent],
        ctx: &RiskContext,
        market: &dyn MarketData,
    ) -> ExecutionPlan {
        let status = self.evaluate_status(ctx);
        let actions = self.process(intents, ctx, market);
        let plan = ExecutionPlan {
            plan_id: ExecutionPlan::generate_id(),
            generated_at: Utc::now(),
            actions,
            metadata: serde_json::json!({
                "kill_switch": status.active(),
                "kill_reasons": status.describe(),
                "equity": ctx.equity.to_string(),
                "daily_drawdown_pct": ctx.daily_drawdown_pct.to_string(),
            }),
        };
        info!(
            plan_id = %plan.plan_id,
            actions = plan.actions.len(),
            "execution plan built"
        );
        plan
    }

    fn process_pair(
        &self,
        pair: Pair,
        group: &[&StrategyIntent],
        ctx: &RiskContext,
        market: &dyn MarketData,
        status: &RiskStatus,
    ) -> RiskAdjustedAction {
        let strategies = join_strategies(group);
        let current_size = ctx.size_of(&pair);
        let current_notional = ctx.value_of(&pair);

        let price = match market.latest_price(&pair) {
            Ok(p) if p.is_positive() => p,
            _ => {
                return self.no_action(
                    pair,
                    strategies,
                    current_size,
                    current_notional,
                    true,
                    vec!["price_unavailable".to_string()],
                    "no usable price, holding".to_string(),
                );
            }
        };

        if status.active() {
            let reducers: Vec<&&StrategyIntent> =
                group.iter().filter(|i| i.kind.reduces_risk()).collect();
            if reducers.is_empty() {
                // New risk is force-blocked; nothing here reduces risk.
                let reasons: Vec<String> =
                    status.reasons.iter().map(ToString::to_string).collect();
                return self.no_action(
                    pair,
                    strategies,
                    current_size,
                    current_notional,
                    true,
                    reasons,
                    format!("kill switch active: {}", status.describe()),
                );
            }
            // The kill switch only stops new risk, never risk reduction.
            let target: Decimal = reducers
                .iter()
                .map(|i| i.desired_notional_usd.unwrap_or(Decimal::ZERO))
                .sum();
            let target = target.min(current_notional).max(Decimal::ZERO);
            return self.derive_action(
                pair,
                strategies,
                target,
                current_size,
                current_notional,
                price,
                false,
                Vec::new(),
                format!("risk reduction under kill switch: {}", status.describe()),
            );
        }

        let active: Vec<&&StrategyIntent> = group
            .iter()
            .filter(|i| i.kind != IntentKind::Hold)
            .collect();
        if active.is_empty() {
            return self.no_action(
                pair,
                strategies,
                current_size,
                current_notional,
                false,
                Vec::new(),
                "hold".to_string(),
            );
        }

        // Aggregate desired exposure across contributing strategies.
        let mut target = Decimal::ZERO;
        for intent in &active {
            let contribution = match intent.kind {
                IntentKind::Enter | IntentKind::Increase => {
                    match intent.desired_notional_usd {
                        Some(n) => n,
                        None => self.auto_size(intent, price, ctx, market),
                    }
                }
                IntentKind::Reduce => intent.desired_notional_usd.unwrap_or(Decimal::ZERO),
                IntentKind::Exit => Decimal::ZERO,
                IntentKind::Hold => unreachable!("holds filtered above"),
            };
            target += contribution;
        }

        let mut blocked_reasons = Vec::new();
        let mut blocked = false;

        // Per-asset cap: lower to the cap, still submit the capped size.
        let cap = ctx.equity * self.limits.max_per_asset_pct / Decimal::from(100);
        let other_exposure = (ctx
            .asset_exposures
            .get(&pair.base)
            .copied()
            .unwrap_or(Decimal::ZERO)
            - current_notional)
            .max(Decimal::ZERO);
        let allowed = (cap - other_exposure).max(Decimal::ZERO);
        if target > allowed {
            blocked_reasons.push(format!(
                "per_asset_cap: target {target} exceeds allowed {allowed} (cap {cap})"
            ));
            target = allowed;
        }

        // Opening a brand-new position counts against max_open_positions.
        if current_size.is_zero()
            && target > DUST_FLOOR_USD
            && ctx.open_positions_above(DUST_FLOOR_USD) >= self.limits.max_open_positions
        {
            blocked_reasons.push(format!(
                "max_open_positions: already {} open",
                self.limits.max_open_positions
            ));
            blocked = true;
            target = Decimal::ZERO;
        }

        self.derive_action(
            pair,
            strategies,
            target,
            current_size,
            current_notional,
            price,
            blocked,
            blocked_reasons,
            String::new(),
        )
    }

    /// Volatility-based sizing for intents with no explicit exposure.
    ///
    /// stop = 2 x ATR; a zero ATR yields zero notional, never a division
    /// by zero.
    fn auto_size(
        &self,
        intent: &StrategyIntent,
        price: Price,
        ctx: &RiskContext,
        market: &dyn MarketData,
    ) -> Decimal {
        let candles = match market.ohlc(
            &intent.pair,
            &intent.timeframe,
            self.limits.atr_lookback + 1,
        ) {
            Ok(c) => c,
            Err(e) => {
                debug!(pair = %intent.pair, error = %e, "no OHLC for auto-sizing");
                return Decimal::ZERO;
            }
        };
        let atr = average_true_range(&candles, self.limits.atr_lookback);
        if atr.is_zero() {
            return Decimal::ZERO;
        }
        let stop_distance = atr * Decimal::from(2);
        let stop_pct = stop_distance / price.inner();
        if stop_pct.is_zero() {
            return Decimal::ZERO;
        }
        let risk_amount = ctx.equity * self.limits.max_risk_per_trade_pct / Decimal::from(100);
        risk_amount / stop_pct
    }

    /// Compare target and current notional through the hysteresis band.
    #[allow(clippy::too_many_arguments)]
    fn derive_action(
        &self,
        pair: Pair,
        strategies: String,
        target_notional: Decimal,
        current_size: Size,
        current_notional: Decimal,
        price: Price,
        blocked: bool,
        blocked_reasons: Vec<String>,
        reason_prefix: String,
    ) -> RiskAdjustedAction {
        let delta = target_notional - current_notional;
        let kind = if blocked {
            ActionKind::None
        } else if delta.abs() <= HYSTERESIS_USD {
            ActionKind::None
        } else if delta > Decimal::ZERO {
            if current_size.is_zero() {
                ActionKind::Open
            } else {
                ActionKind::Increase
            }
        } else if target_notional <= DUST_FLOOR_USD {
            ActionKind::Close
        } else {
            ActionKind::Reduce
        };

        let target_size = match kind {
            ActionKind::Close => Size::ZERO,
            _ => Size::new(target_notional / price.inner()),
        };

        let reason = if reason_prefix.is_empty() {
            format!(
                "{strategies}: target {target_notional} vs current {current_notional}"
            )
        } else {
            reason_prefix
        };

        RiskAdjustedAction {
            pair,
            strategies,
            kind,
            target_size,
            target_notional,
            current_size,
            reason,
            blocked,
            blocked_reasons,
            limits: self.limits.clone(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn no_action(
        &self,
        pair: Pair,
        strategies: String,
        current_size: Size,
        current_notional: Decimal,
        blocked: bool,
        blocked_reasons: Vec<String>,
        reason: String,
    ) -> RiskAdjustedAction {
        RiskAdjustedAction {
            pair,
            strategies,
            kind: ActionKind::None,
            target_size: current_size,
            target_notional: current_notional,
            current_size,
            reason,
            blocked,
            blocked_reasons,
            limits: self.limits.clone(),
        }
    }
}

fn join_strategies(group: &[&StrategyIntent]) -> String {
    let mut seen = Vec::new();
    for intent in group {
        if !seen.iter().any(|s: &String| s == &intent.strategy) {
            seen.push(intent.strategy.clone());
        }
    }
    seen.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_core::{PairMetadata, SignalSide};
    use helm_exchange::{Candle, MarketDataError, MarketDataResult};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    struct StubMarket {
        prices: HashMap<String, Decimal>,
        candles: Vec<Candle>,
    }

    impl StubMarket {
        fn new(prices: &[(&str, Decimal)]) -> Self {
            Self {
                prices: prices.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
                candles: Vec::new(),
            }
        }

        fn with_candles(mut self, candles: Vec<Candle>) -> Self {
            self.candles = candles;
            self
        }
    }

    impl MarketData for StubMarket {
        fn latest_price(&self, pair: &Pair) -> MarketDataResult<Price> {
            self.prices
                .get(&pair.symbol())
                .map(|p| Price::new(*p))
                .ok_or_else(|| MarketDataError::UnknownPair(pair.symbol()))
        }

        fn ohlc(&self, _: &Pair, _: &str, _: usize) -> MarketDataResult<Vec<Candle>> {
            Ok(self.candles.clone())
        }

        fn best_bid_ask(&self, pair: &Pair) -> MarketDataResult<(Price, Price)> {
            let p = self.latest_price(pair)?;
            Ok((p, p))
        }

        fn pair_metadata(&self, _: &Pair) -> MarketDataResult<PairMetadata> {
            Ok(PairMetadata {
                price_decimals: 1,
                volume_decimals: 8,
                min_order_size: Size::new(dec!(0.0001)),
            })
        }
    }

    fn engine() -> RiskEngine {
        RiskEngine::new(RiskLimits::default(), Arc::new(KillSwitch::new()))
    }

    fn ctx_with_equity(equity: Decimal) -> RiskContext {
        RiskContext {
            equity,
            ..RiskContext::default()
        }
    }

    fn enter_intent(pair: Pair, notional: Decimal) -> StrategyIntent {
        StrategyIntent::new(
            "trend",
            pair,
            SignalSide::Long,
            IntentKind::Enter,
            Some(notional),
            dec!(0.9),
            "1h",
        )
    }

    fn exit_intent(pair: Pair) -> StrategyIntent {
        StrategyIntent::new(
            "trend",
            pair,
            SignalSide::Flat,
            IntentKind::Exit,
            None,
            dec!(0.9),
            "1h",
        )
    }

    #[test]
    fn test_enter_produces_open_action() {
        let market = StubMarket::new(&[("BTC/USD", dec!(50000))]);
        let ctx = ctx_with_equity(dec!(100000));
        let intents = vec![enter_intent(Pair::new("BTC", "USD"), dec!(1000))];

        let actions = engine().process(&intents, &ctx, &market);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Open);
        assert_eq!(actions[0].target_notional, dec!(1000));
        assert_eq!(actions[0].target_size, Size::new(dec!(0.02)));
        assert!(!actions[0].blocked);
    }

    #[test]
    fn test_kill_switch_blocks_enter_allows_exit() {
        let kill = Arc::new(KillSwitch::new());
        kill.engage("operator");
        let engine = RiskEngine::new(RiskLimits::default(), kill);

        let market = StubMarket::new(&[("BTC/USD", dec!(50000)), ("ETH/USD", dec!(2000))]);
        let mut ctx = ctx_with_equity(dec!(100000));
        ctx.position_sizes
            .insert(Pair::new("ETH", "USD"), Size::new(dec!(5)));
        ctx.position_values
            .insert(Pair::new("ETH", "USD"), dec!(10000));

        let intents = vec![
            enter_intent(Pair::new("BTC", "USD"), dec!(1000)),
            exit_intent(Pair::new("ETH", "USD")),
        ];
        let actions = engine.process(&intents, &ctx, &market);

        let btc = actions.iter().find(|a| a.pair.base == "BTC").unwrap();
        assert_eq!(btc.kind, ActionKind::None);
        assert!(btc.blocked);
        assert!(btc
            .blocked_reasons
            .iter()
            .any(|r| r.contains("manual_override")));

        let eth = actions.iter().find(|a| a.pair.base == "ETH").unwrap();
        assert_eq!(eth.kind, ActionKind::Close);
        assert!(!eth.blocked);
        assert_eq!(eth.target_size, Size::ZERO);
    }

    #[test]
    fn test_kill_reasons_are_additive() {
        let kill = Arc::new(KillSwitch::new());
        kill.engage("operator");
        let engine = RiskEngine::new(RiskLimits::default(), kill);

        let mut ctx = ctx_with_equity(dec!(90000));
        ctx.daily_drawdown_pct = dec!(10);
        ctx.drift_flag = true;

        let status = engine.evaluate_status(&ctx);
        assert_eq!(status.reasons.len(), 3);
    }

    #[test]
    fn test_drawdown_alone_trips_switch() {
        let engine = engine();
        let mut ctx = ctx_with_equity(dec!(90000));
        ctx.daily_drawdown_pct = dec!(6);
        assert!(engine.evaluate_status(&ctx).active());

        ctx.daily_drawdown_pct = dec!(4);
        assert!(!engine.evaluate_status(&ctx).active());
    }

    #[test]
    fn test_per_asset_cap_lowers_target_but_submits() {
        // Equity 10_000, cap 25% => 2_500. Ask for 5_000.
        let market = StubMarket::new(&[("BTC/USD", dec!(50000))]);
        let ctx = ctx_with_equity(dec!(10000));
        let intents = vec![enter_intent(Pair::new("BTC", "USD"), dec!(5000))];

        let actions = engine().process(&intents, &ctx, &market);
        let action = &actions[0];
        assert_eq!(action.target_notional, dec!(2500));
        assert_eq!(action.kind, ActionKind::Open);
        assert!(!action.blocked);
        assert!(action
            .blocked_reasons
            .iter()
            .any(|r| r.contains("per_asset_cap")));
    }

    #[test]
    fn test_max_open_positions_blocks_new() {
        let limits = RiskLimits {
            max_open_positions: 1,
            ..RiskLimits::default()
        };
        let engine = RiskEngine::new(limits, Arc::new(KillSwitch::new()));

        let market = StubMarket::new(&[("BTC/USD", dec!(50000))]);
        let mut ctx = ctx_with_equity(dec!(100000));
        ctx.position_values
            .insert(Pair::new("ETH", "USD"), dec!(10000));

        let intents = vec![enter_intent(Pair::new("BTC", "USD"), dec!(1000))];
        let actions = engine.process(&intents, &ctx, &market);
        assert_eq!(actions[0].kind, ActionKind::None);
        assert!(actions[0].blocked);
        assert!(actions[0]
            .blocked_reasons
            .iter()
            .any(|r| r.contains("max_open_positions")));
    }

    #[test]
    fn test_dust_positions_do_not_count() {
        let limits = RiskLimits {
            max_open_positions: 1,
            ..RiskLimits::default()
        };
        let engine = RiskEngine::new(limits, Arc::new(KillSwitch::new()));

        let market = StubMarket::new(&[("BTC/USD", dec!(50000))]);
        let mut ctx = ctx_with_equity(dec!(100000));
        // Below the $10 dust floor: does not occupy a slot.
        ctx.position_values
            .insert(Pair::new("ETH", "USD"), dec!(5));

        let intents = vec![enter_intent(Pair::new("BTC", "USD"), dec!(1000))];
        let actions = engine.process(&intents, &ctx, &market);
        assert_eq!(actions[0].kind, ActionKind::Open);
    }

    #[test]
    fn test_hysteresis_suppresses_noise() {
        let market = StubMarket::new(&[("BTC/USD", dec!(50000))]);
        let mut ctx = ctx_with_equity(dec!(100000));
        let pair = Pair::new("BTC", "USD");
        ctx.position_sizes.insert(pair.clone(), Size::new(dec!(0.02)));
        ctx.position_values.insert(pair.clone(), dec!(1000));

        // Target within $10 of current: no churn.
        let intents = vec![enter_intent(pair, dec!(1005))];
        let actions = engine().process(&intents, &ctx, &market);
        assert_eq!(actions[0].kind, ActionKind::None);
    }

    #[test]
    fn test_auto_size_zero_atr_yields_zero() {
        let flat = Candle {
            start: Utc::now(),
            open: Price::new(dec!(100)),
            high: Price::new(dec!(100)),
            low: Price::new(dec!(100)),
            close: Price::new(dec!(100)),
            volume: Size::new(dec!(1)),
        };
        let market =
            StubMarket::new(&[("BTC/USD", dec!(100))]).with_candles(vec![flat; 15]);
        let ctx = ctx_with_equity(dec!(100000));

        let intent = StrategyIntent::new(
            "trend",
            Pair::new("BTC", "USD"),
            SignalSide::Long,
            IntentKind::Enter,
            None, // auto-size
            dec!(0.9),
            "1h",
        );
        let actions = engine().process(&[intent], &ctx, &market);
        assert_eq!(actions[0].target_notional, dec!(0));
        assert_eq!(actions[0].kind, ActionKind::None);
    }

    #[test]
    fn test_auto_size_from_atr() {
        // ATR 2 at price 100 -> stop 4, stop_pct 4%. Equity 10_000 at 1%
        // risk -> 100 risked -> 2_500 notional.
        let mut candles = Vec::new();
        for _ in 0..15 {
            candles.push(Candle {
                start: Utc::now(),
                open: Price::new(dec!(100)),
                high: Price::new(dec!(101)),
                low: Price::new(dec!(99)),
                close: Price::new(dec!(100)),
                volume: Size::new(dec!(1)),
            });
        }
        let market = StubMarket::new(&[("BTC/USD", dec!(100))]).with_candles(candles);
        let ctx = ctx_with_equity(dec!(10000));

        let intent = StrategyIntent::new(
            "trend",
            Pair::new("BTC", "USD"),
            SignalSide::Long,
            IntentKind::Enter,
            None,
            dec!(0.9),
            "1h",
        );
        let actions = engine().process(&[intent], &ctx, &market);
        assert_eq!(actions[0].target_notional, dec!(2500));
    }

    #[test]
    fn test_strategies_joined_on_aggregation() {
        let market = StubMarket::new(&[("BTC/USD", dec!(50000))]);
        let ctx = ctx_with_equity(dec!(100000));
        let pair = Pair::new("BTC", "USD");
        let mut second = enter_intent(pair.clone(), dec!(500));
        second.strategy = "meanrev".to_string();
        let intents = vec![enter_intent(pair, dec!(1000)), second];

        let actions = engine().process(&intents, &ctx, &market);
        assert_eq!(actions[0].strategies, "trend,meanrev");
        assert_eq!(actions[0].target_notional, dec!(1500));
    }

    #[test]
    fn test_missing_price_blocks_pair() {
        let market = StubMarket::new(&[]);
        let ctx = ctx_with_equity(dec!(100000));
        let intents = vec![enter_intent(Pair::new("BTC", "USD"), dec!(1000))];

        let actions = engine().process(&intents, &ctx, &market);
        assert!(actions[0].blocked);
        assert_eq!(actions[0].kind, ActionKind::None);
    }

    #[test]
    fn test_action_carries_limit_snapshot() {
        let market = StubMarket::new(&[("BTC/USD", dec!(50000))]);
        let ctx = ctx_with_equity(dec!(100000));
        let intents = vec![enter_intent(Pair::new("BTC", "USD"), dec!(1000))];

        let actions = engine().process(&intents, &ctx, &market);
        assert_eq!(actions[0].limits, RiskLimits::default());
    }
}
