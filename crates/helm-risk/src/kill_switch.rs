//! Kill switch: blocks new risk, never blocks risk reduction.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Why the kill switch is active. Reasons are additive: several can hold
/// at once and all are recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KillReason {
    /// Operator pulled the switch.
    ManualOverride,
    /// 24h drawdown breached the configured limit.
    DrawdownExceeded { current_pct: Decimal, max_pct: Decimal },
    /// Ledger drifted from exchange balances.
    Drift,
}

impl fmt::Display for KillReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManualOverride => write!(f, "manual_override"),
            Self::DrawdownExceeded {
                current_pct,
                max_pct,
            } => write!(f, "daily_drawdown {current_pct}% > {max_pct}%"),
            Self::Drift => write!(f, "position_drift"),
        }
    }
}

/// Operator-settable latch. Once set, it stays set until manually reset;
/// there is no automatic recovery path.
#[derive(Debug, Default)]
pub struct KillSwitch {
    engaged: AtomicBool,
    reason: RwLock<Option<String>>,
}

impl KillSwitch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    /// Engage the switch. No-op if already engaged (original reason kept).
    pub fn engage(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self
            .engaged
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.reason.write() = Some(reason.clone());
            warn!(reason, "kill switch engaged");
        }
    }

    /// Manual reset by an operator after investigating.
    pub fn reset(&self) {
        if self.engaged.swap(false, Ordering::SeqCst) {
            let previous = self.reason.write().take();
            info!(?previous, "kill switch reset");
        }
    }

    #[must_use]
    pub fn reason(&self) -> Option<String> {
        if self.is_engaged() {
            self.reason.read().clone()
        } else {
            None
        }
    }
}

/// Kill-switch state as computed for one cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskStatus {
    pub reasons: Vec<KillReason>,
}

impl RiskStatus {
    #[must_use]
    pub fn active(&self) -> bool {
        !self.reasons.is_empty()
    }

    /// Reasons joined for log and audit strings.
    #[must_use]
    pub fn describe(&self) -> String {
        self.reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Read side of the kill switch, consulted by the execution service
/// before it touches the adapter.
pub trait RiskStatusSource: Send + Sync {
    fn kill_switch_active(&self) -> bool;
}

impl RiskStatusSource for RiskStatus {
    fn kill_switch_active(&self) -> bool {
        self.active()
    }
}
