//! Core domain types for the helm trading control plane.
//!
//! This crate provides the types shared by every other helm crate:
//! - `Pair`, `PairMetadata`: trading pair identity and exchange precision rules
//! - `Price`, `Size`: precision-safe numeric types
//! - `StrategyIntent`: what a strategy wants, before risk adjustment
//! - `LocalOrder` and its status state machine
//! - `ExecutionReport`: the per-plan audit record

pub mod decimal;
pub mod error;
pub mod intent;
pub mod order;
pub mod pair;
pub mod report;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use intent::{IntentKind, SignalSide, StrategyIntent};
pub use order::{LocalOrder, LocalOrderId, OrderSide, OrderStatus, OrderType};
pub use pair::{Pair, PairMetadata};
pub use report::ExecutionReport;
