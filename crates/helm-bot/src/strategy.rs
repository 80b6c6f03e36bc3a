//! Strategy provider contract and the built-in constant-mix strategy.

use rust_decimal::Decimal;
use tracing::warn;

use helm_core::{IntentKind, Pair, SignalSide, StrategyIntent};
use helm_exchange::MarketData;
use helm_portfolio::PortfolioLedger;

use crate::config::StrategyConfig;
use crate::error::{AppError, AppResult};

/// Produces intents once per cycle. Implementations are read-only over
/// the ledger; sizing and clamping are the risk engine's business.
pub trait StrategyProvider: Send + Sync {
    fn name(&self) -> &str;

    fn generate_intents(
        &self,
        ledger: &PortfolioLedger,
        market: &dyn MarketData,
    ) -> Vec<StrategyIntent>;
}

/// Holds each configured pair at a fixed USD exposure.
///
/// Emits absolute targets; the risk engine computes the delta and the
/// hysteresis band keeps it from churning on price noise.
pub struct ConstantMixStrategy {
    name: String,
    timeframe: String,
    targets: Vec<(Pair, Decimal)>,
}

impl ConstantMixStrategy {
    pub fn from_config(config: &StrategyConfig) -> AppResult<Self> {
        let mut targets = Vec::with_capacity(config.targets.len());
        for target in &config.targets {
            let pair = target
                .pair
                .parse::<Pair>()
                .map_err(|e| AppError::Config(e.to_string()))?;
            targets.push((pair, target.notional_usd));
        }
        Ok(Self {
            name: config.name.clone(),
            timeframe: config.timeframe.clone(),
            targets,
        })
    }
}

impl StrategyProvider for ConstantMixStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate_intents(
        &self,
        ledger: &PortfolioLedger,
        market: &dyn MarketData,
    ) -> Vec<StrategyIntent> {
        let mut intents = Vec::with_capacity(self.targets.len());
        for (pair, target) in &self.targets {
            let price = match market.latest_price(pair) {
                Ok(p) => p,
                Err(e) => {
                    warn!(%pair, error = %e, "no price, skipping target");
                    continue;
                }
            };
            let current = ledger.position_size(pair).notional(price);

            let (side, kind, desired) = if target.is_zero() {
                if current.is_zero() {
                    (SignalSide::Flat, IntentKind::Hold, None)
                } else {
                    (SignalSide::Flat, IntentKind::Exit, None)
                }
            } else if current.is_zero() {
                (SignalSide::Long, IntentKind::Enter, Some(*target))
            } else if *target > current {
                (SignalSide::Long, IntentKind::Increase, Some(*target))
            } else if *target < current {
                (SignalSide::Long, IntentKind::Reduce, Some(*target))
            } else {
                (SignalSide::Long, IntentKind::Hold, None)
            };

            intents.push(StrategyIntent::new(
                self.name.clone(),
                pair.clone(),
                side,
                kind,
                desired,
                Decimal::ONE,
                self.timeframe.clone(),
            ));
        }
        intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetAllocation;
    use crate::market::PaperMarket;
    use helm_core::{OrderSide, Price, Size};
    use helm_portfolio::{LedgerConfig, TradeRecord};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn strategy(notional: Decimal) -> ConstantMixStrategy {
        ConstantMixStrategy::from_config(&StrategyConfig {
            targets: vec![TargetAllocation {
                pair: "BTC/USD".to_string(),
                notional_usd: notional,
            }],
            ..StrategyConfig::default()
        })
        .unwrap()
    }

    fn market() -> PaperMarket {
        let mut prices = HashMap::new();
        prices.insert("BTC/USD".to_string(), dec!(50000));
        PaperMarket::new(&prices)
    }

    fn ledger_with_position(volume: Decimal) -> PortfolioLedger {
        let mut ledger = PortfolioLedger::new(LedgerConfig::default());
        ledger.apply_trade(&TradeRecord {
            trade_id: "t1".to_string(),
            order_ref: None,
            userref: None,
            strategy: None,
            pair: Pair::new("BTC", "USD"),
            side: OrderSide::Buy,
            price: Price::new(dec!(50000)),
            volume: Size::new(volume),
            fee_quote: dec!(0),
            quote_rate: None,
            executed_at: chrono::Utc::now(),
        });
        ledger
    }

    #[test]
    fn test_flat_position_enters() {
        let ledger = PortfolioLedger::new(LedgerConfig::default());
        let intents = strategy(dec!(1000)).generate_intents(&ledger, &market());
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].kind, IntentKind::Enter);
        assert_eq!(intents[0].desired_notional_usd, Some(dec!(1000)));
    }

    #[test]
    fn test_at_target_holds() {
        // 0.02 BTC @ 50k = exactly the $1000 target.
        let ledger = ledger_with_position(dec!(0.02));
        let intents = strategy(dec!(1000)).generate_intents(&ledger, &market());
        assert_eq!(intents[0].kind, IntentKind::Hold);
    }

    #[test]
    fn test_over_target_reduces() {
        let ledger = ledger_with_position(dec!(0.05));
        let intents = strategy(dec!(1000)).generate_intents(&ledger, &market());
        assert_eq!(intents[0].kind, IntentKind::Reduce);
        assert_eq!(intents[0].desired_notional_usd, Some(dec!(1000)));
    }

    #[test]
    fn test_zero_target_exits() {
        let ledger = ledger_with_position(dec!(0.02));
        let intents = strategy(dec!(0)).generate_intents(&ledger, &market());
        assert_eq!(intents[0].kind, IntentKind::Exit);
        assert_eq!(intents[0].side, SignalSide::Flat);
    }

    #[test]
    fn test_unknown_price_skipped() {
        let ledger = PortfolioLedger::new(LedgerConfig::default());
        let empty = PaperMarket::new(&HashMap::new());
        assert!(strategy(dec!(1000)).generate_intents(&ledger, &empty).is_empty());
    }
}
