//! Risk engine for the helm trading control plane.
//!
//! Converts strategy intents into bounded, auditable actions: builds a
//! `RiskContext` from the portfolio ledger, applies the kill switch,
//! sizes unsized intents from volatility, clamps against per-asset and
//! open-position limits, and emits an `ExecutionPlan` for the OMS.

pub mod atr;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod kill_switch;

pub use atr::average_true_range;
pub use config::{RiskLimits, DUST_FLOOR_USD, HYSTERESIS_USD};
pub use context::RiskContext;
pub use engine::{ActionKind, ExecutionPlan, RiskAdjustedAction, RiskEngine};
pub use error::{RiskError, RiskResult};
pub use kill_switch::{KillReason, KillSwitch, RiskStatus, RiskStatusSource};
