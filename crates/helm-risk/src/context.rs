//! Per-cycle risk context derived from the portfolio ledger.
//!
//! Built fresh each cycle and passed by value, so the staleness of the
//! drift flag (set by the previous cycle's reconciliation) is explicit
//! rather than hidden in shared mutable state.

use std::collections::HashMap;

use chrono::Duration;
use rust_decimal::Decimal;

use helm_core::{Pair, Size};
use helm_exchange::MarketData;
use helm_portfolio::PortfolioLedger;

/// Everything the risk engine needs to know about the portfolio.
#[derive(Debug, Clone, Default)]
pub struct RiskContext {
    /// Total equity in base currency.
    pub equity: Decimal,
    /// 24h drawdown from the snapshot high-water mark, in percent,
    /// clamped at zero.
    pub daily_drawdown_pct: Decimal,
    /// Drift flag from the previous cycle's reconciliation.
    pub drift_flag: bool,
    /// Base-currency exposure per base asset.
    pub asset_exposures: HashMap<String, Decimal>,
    /// Current position size per pair.
    pub position_sizes: HashMap<Pair, Size>,
    /// Base-currency value per open position.
    pub position_values: HashMap<Pair, Decimal>,
}

impl RiskContext {
    /// Build the context from the ledger and current prices.
    pub fn from_ledger(ledger: &PortfolioLedger, market: &dyn MarketData) -> Self {
        let equity = ledger.equity(market);

        let daily_drawdown_pct = match ledger.max_equity_within(Duration::hours(24)) {
            Some(high) if high > Decimal::ZERO => {
                let dd = (high - equity) / high * Decimal::from(100);
                dd.max(Decimal::ZERO)
            }
            _ => Decimal::ZERO,
        };

        let mut position_sizes = HashMap::new();
        let mut position_values = HashMap::new();
        for position in ledger.positions().filter(|p| p.is_open()) {
            position_sizes.insert(position.pair.clone(), position.size);
            let value = ledger
                .pair_price(&position.pair, market)
                .map(|price| position.current_value(price))
                .unwrap_or(Decimal::ZERO);
            position_values.insert(position.pair.clone(), value);
        }

        Self {
            equity,
            daily_drawdown_pct,
            drift_flag: ledger.drift_flag(),
            asset_exposures: ledger.asset_exposures(market),
            position_sizes,
            position_values,
        }
    }

    /// Current position size for a pair, zero when flat.
    #[must_use]
    pub fn size_of(&self, pair: &Pair) -> Size {
        self.position_sizes.get(pair).copied().unwrap_or(Size::ZERO)
    }

    /// Current base-currency value of a pair's position.
    #[must_use]
    pub fn value_of(&self, pair: &Pair) -> Decimal {
        self.position_values
            .get(pair)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Number of open positions above the dust floor.
    #[must_use]
    pub fn open_positions_above(&self, floor: Decimal) -> usize {
        self.position_values.values().filter(|v| **v > floor).count()
    }
}
