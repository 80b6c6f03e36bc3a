//! Execution guardrail configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, ExecutionResult};

/// Guardrails applied to every plan before the adapter is touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Live submission. False means every exchange call carries the
    /// validate/dry-run flag and nothing real is placed.
    #[serde(default)]
    pub live: bool,
    /// Budget of simultaneously working orders, open ones included.
    #[serde(default = "default_max_concurrent_orders")]
    pub max_concurrent_orders: usize,
    /// Per-pair notional ceiling per plan (USD).
    #[serde(default = "default_max_pair_notional_usd")]
    pub max_pair_notional_usd: Decimal,
    /// Aggregate notional ceiling per plan (USD).
    #[serde(default = "default_max_total_notional_usd")]
    pub max_total_notional_usd: Decimal,
    /// Limit-price slippage tolerance, in percent. Buys are capped
    /// upward, sells floored downward.
    #[serde(default = "default_slippage_tolerance_pct")]
    pub slippage_tolerance_pct: Decimal,
    /// Retry budget for transient exchange errors. Capped at 16: the
    /// backoff doubles per attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential submission backoff.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Dead-man switch window: the exchange cancels everything if no
    /// heartbeat arrives within this many seconds.
    #[serde(default = "default_deadman_timeout_secs")]
    pub deadman_timeout_secs: u32,
}

fn default_max_concurrent_orders() -> usize {
    5
}

fn default_max_pair_notional_usd() -> Decimal {
    Decimal::from(10_000)
}

fn default_max_total_notional_usd() -> Decimal {
    Decimal::from(25_000)
}

fn default_slippage_tolerance_pct() -> Decimal {
    Decimal::new(5, 1) // 0.5%
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_deadman_timeout_secs() -> u32 {
    90
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            live: false,
            max_concurrent_orders: default_max_concurrent_orders(),
            max_pair_notional_usd: default_max_pair_notional_usd(),
            max_total_notional_usd: default_max_total_notional_usd(),
            slippage_tolerance_pct: default_slippage_tolerance_pct(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            deadman_timeout_secs: default_deadman_timeout_secs(),
        }
    }
}

impl ExecutionConfig {
    /// Validate once at load time.
    pub fn validate(&self) -> ExecutionResult<()> {
        if self.max_concurrent_orders == 0 {
            return Err(ExecutionError::InvalidConfig(
                "max_concurrent_orders must be at least 1".to_string(),
            ));
        }
        if self.max_pair_notional_usd <= Decimal::ZERO
            || self.max_total_notional_usd <= Decimal::ZERO
        {
            return Err(ExecutionError::InvalidConfig(
                "notional limits must be positive".to_string(),
            ));
        }
        if self.max_pair_notional_usd > self.max_total_notional_usd {
            return Err(ExecutionError::InvalidConfig(
                "max_pair_notional_usd cannot exceed max_total_notional_usd".to_string(),
            ));
        }
        if self.slippage_tolerance_pct < Decimal::ZERO
            || self.slippage_tolerance_pct >= Decimal::from(100)
        {
            return Err(ExecutionError::InvalidConfig(
                "slippage_tolerance_pct must be in [0, 100)".to_string(),
            ));
        }
        if self.max_retries > 16 {
            // The backoff shift would overflow long before a retry that
            // deep could help.
            return Err(ExecutionError::InvalidConfig(
                "max_retries must be at most 16".to_string(),
            ));
        }
        if self.deadman_timeout_secs == 0 {
            return Err(ExecutionError::InvalidConfig(
                "deadman_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_valid() {
        assert!(ExecutionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_notional_limits() {
        let config = ExecutionConfig {
            max_pair_notional_usd: dec!(50000),
            max_total_notional_usd: dec!(25000),
            ..ExecutionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_retry_budget() {
        let config = ExecutionConfig {
            max_retries: 64,
            ..ExecutionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_full_slippage() {
        let config = ExecutionConfig {
            slippage_tolerance_pct: dec!(100),
            ..ExecutionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
