//! Risk limit configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

/// Positions valued at or below this are treated as dust (USD).
pub const DUST_FLOOR_USD: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Band around the current notional inside which no action is taken
/// (USD). Avoids churn from rounding noise.
pub const HYSTERESIS_USD: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Risk limits applied every cycle.
///
/// A snapshot of these travels on every `RiskAdjustedAction` so a reviewer
/// can replay exactly which limits produced a given decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Kill-switch threshold: 24h drawdown percentage.
    #[serde(default = "default_max_daily_drawdown_pct")]
    pub max_daily_drawdown_pct: Decimal,
    /// Fraction of equity risked per auto-sized trade, in percent.
    #[serde(default = "default_max_risk_per_trade_pct")]
    pub max_risk_per_trade_pct: Decimal,
    /// Per-asset exposure cap as a percentage of equity.
    #[serde(default = "default_max_per_asset_pct")]
    pub max_per_asset_pct: Decimal,
    /// Maximum simultaneous non-dust open positions.
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// Whether ledger drift trips the kill switch.
    #[serde(default = "default_kill_switch_on_drift")]
    pub kill_switch_on_drift: bool,
    /// OHLC lookback (bars) for ATR sizing.
    #[serde(default = "default_atr_lookback")]
    pub atr_lookback: usize,
    /// Portfolio-wide aggregate risk cap, in percent.
    ///
    /// Parsed and carried in the snapshot for audit, but NOT enforced:
    /// only per-asset and per-trade caps are applied.
    #[serde(default = "default_max_portfolio_risk_pct")]
    pub max_portfolio_risk_pct: Decimal,
}

fn default_max_daily_drawdown_pct() -> Decimal {
    Decimal::from(5)
}

fn default_max_risk_per_trade_pct() -> Decimal {
    Decimal::ONE
}

fn default_max_per_asset_pct() -> Decimal {
    Decimal::from(25)
}

fn default_max_open_positions() -> usize {
    5
}

fn default_kill_switch_on_drift() -> bool {
    true
}

fn default_atr_lookback() -> usize {
    14
}

fn default_max_portfolio_risk_pct() -> Decimal {
    Decimal::from(10)
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_daily_drawdown_pct: default_max_daily_drawdown_pct(),
            max_risk_per_trade_pct: default_max_risk_per_trade_pct(),
            max_per_asset_pct: default_max_per_asset_pct(),
            max_open_positions: default_max_open_positions(),
            kill_switch_on_drift: default_kill_switch_on_drift(),
            atr_lookback: default_atr_lookback(),
            max_portfolio_risk_pct: default_max_portfolio_risk_pct(),
        }
    }
}

impl RiskLimits {
    /// Validate once at load time.
    pub fn validate(&self) -> RiskResult<()> {
        if self.max_daily_drawdown_pct <= Decimal::ZERO {
            return Err(RiskError::InvalidConfig(
                "max_daily_drawdown_pct must be positive".to_string(),
            ));
        }
        if self.max_risk_per_trade_pct <= Decimal::ZERO {
            return Err(RiskError::InvalidConfig(
                "max_risk_per_trade_pct must be positive".to_string(),
            ));
        }
        if self.max_per_asset_pct <= Decimal::ZERO || self.max_per_asset_pct > Decimal::from(100) {
            return Err(RiskError::InvalidConfig(
                "max_per_asset_pct must be in (0, 100]".to_string(),
            ));
        }
        if self.max_open_positions == 0 {
            return Err(RiskError::InvalidConfig(
                "max_open_positions must be at least 1".to_string(),
            ));
        }
        if self.atr_lookback < 2 {
            return Err(RiskError::InvalidConfig(
                "atr_lookback must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}
