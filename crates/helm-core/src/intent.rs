//! Strategy intents: what a strategy wants before risk adjustment.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Pair;

/// Directional stance a strategy takes on a pair.
///
/// Spot-only: `Long` holds the base asset, `Flat` holds none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSide {
    Long,
    Flat,
}

/// What the strategy wants done with its exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    /// Open a new position.
    Enter,
    /// Add to an existing position.
    Increase,
    /// Trim an existing position.
    Reduce,
    /// Close the position entirely.
    Exit,
    /// Keep whatever is held.
    Hold,
}

impl IntentKind {
    /// Returns true for intents that add risk (gated by the kill switch).
    #[must_use]
    pub fn adds_risk(&self) -> bool {
        matches!(self, Self::Enter | Self::Increase)
    }

    /// Returns true for intents that shed risk (always allowed through).
    #[must_use]
    pub fn reduces_risk(&self) -> bool {
        matches!(self, Self::Reduce | Self::Exit)
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enter => "enter",
            Self::Increase => "increase",
            Self::Reduce => "reduce",
            Self::Exit => "exit",
            Self::Hold => "hold",
        };
        write!(f, "{s}")
    }
}

/// One strategy's desired exposure for one pair, produced once per cycle.
///
/// Immutable after creation. `desired_notional_usd = None` delegates sizing
/// to the risk engine (ATR-based).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyIntent {
    /// Originating strategy id.
    pub strategy: String,
    pub pair: Pair,
    pub side: SignalSide,
    pub kind: IntentKind,
    /// Desired USD exposure; None lets the risk engine size the trade.
    pub desired_notional_usd: Option<Decimal>,
    /// Confidence in [0, 1].
    pub confidence: Decimal,
    /// Timeframe the signal was computed on (e.g. "1h").
    pub timeframe: String,
    pub generated_at: DateTime<Utc>,
    /// Free-form diagnostics from the strategy.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl StrategyIntent {
    #[must_use]
    pub fn new(
        strategy: impl Into<String>,
        pair: Pair,
        side: SignalSide,
        kind: IntentKind,
        desired_notional_usd: Option<Decimal>,
        confidence: Decimal,
        timeframe: impl Into<String>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            pair,
            side,
            kind,
            desired_notional_usd,
            confidence,
            timeframe: timeframe.into(),
            generated_at: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}
