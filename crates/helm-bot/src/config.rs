//! Application configuration.
//!
//! Loaded from a TOML file with `HELM_`-prefixed environment overrides
//! layered on top. Every section falls back to serde defaults, so a
//! minimal config only has to name what it changes. Validation runs once
//! at load; nothing downstream re-checks limits at call time.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use helm_core::Pair;
use helm_execution::ExecutionConfig;
use helm_portfolio::LedgerConfig;
use helm_risk::RiskLimits;

use crate::error::{AppError, AppResult};

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// In-process fill simulation, no exchange transport required.
    #[default]
    Paper,
    /// Real submissions through a wired exchange transport.
    Live,
}

/// One target allocation for the constant-mix strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetAllocation {
    /// Pair in `BASE/QUOTE` form.
    pub pair: String,
    /// Desired exposure in USD. Zero means hold nothing.
    pub notional_usd: Decimal,
}

/// Strategy section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_strategy_name")]
    pub name: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default)]
    pub targets: Vec<TargetAllocation>,
}

fn default_strategy_name() -> String {
    "constant_mix".to_string()
}

fn default_timeframe() -> String {
    "1h".to_string()
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: default_strategy_name(),
            timeframe: default_timeframe(),
            targets: Vec::new(),
        }
    }
}

/// Paper-mode environment: starting cash and reference prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_starting_cash_usd")]
    pub starting_cash_usd: Decimal,
    /// Reference price per pair symbol (e.g. `"BTC/USD" = 50000`).
    #[serde(default)]
    pub prices: HashMap<String, Decimal>,
}

fn default_starting_cash_usd() -> Decimal {
    Decimal::from(10_000)
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_cash_usd: default_starting_cash_usd(),
            prices: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: OperatingMode,
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    #[serde(default = "default_store_dir")]
    pub store_dir: String,
    #[serde(default)]
    pub risk: RiskLimits,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub paper: PaperConfig,
}

fn default_cycle_interval_secs() -> u64 {
    60
}

fn default_store_dir() -> String {
    "data/store".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::default(),
            cycle_interval_secs: default_cycle_interval_secs(),
            store_dir: default_store_dir(),
            risk: RiskLimits::default(),
            execution: ExecutionConfig::default(),
            ledger: LedgerConfig::default(),
            strategy: StrategyConfig::default(),
            paper: PaperConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from file (when it exists) with `HELM_` env overrides.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let path = path
            .map(str::to_string)
            .or_else(|| std::env::var("HELM_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());

        let mut builder = config::Config::builder();
        if Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(&path));
        } else {
            tracing::warn!(path = %path, "config file not found, using defaults");
        }
        builder = builder.add_source(
            config::Environment::with_prefix("HELM").separator("__"),
        );

        let loaded: Self = builder
            .build()
            .map_err(|e| AppError::Config(format!("failed to load config: {e}")))?
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("failed to parse config: {e}")))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse a specific TOML file, no env layering.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read config: {e}")))?;
        let loaded: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse config: {e}")))?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.cycle_interval_secs == 0 {
            return Err(AppError::Config(
                "cycle_interval_secs must be positive".to_string(),
            ));
        }
        if self.mode == OperatingMode::Paper && self.execution.live {
            return Err(AppError::Config(
                "paper mode cannot set execution.live".to_string(),
            ));
        }
        if self.mode == OperatingMode::Live && !self.execution.live {
            tracing::warn!("live mode with execution.live = false: every order is a dry run");
        }
        self.risk
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.execution
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        for target in &self.strategy.targets {
            if let Err(e) = target.pair.parse::<Pair>() {
                return Err(AppError::Config(format!(
                    "invalid pair in strategy targets: {e}"
                )));
            }
            if target.notional_usd < Decimal::ZERO {
                return Err(AppError::Config(format!(
                    "negative target notional for {}",
                    target.pair
                )));
            }
        }
        Ok(())
    }
}
