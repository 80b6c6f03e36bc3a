//! Trading bot binary crate: configuration, wiring, and the cycle loop.
//!
//! Everything algorithmic lives in the library crates; this crate only
//! assembles them. `Application` owns the components, `run_cycle` is the
//! whole control flow: strategies produce intents, the risk engine turns
//! them into a bounded plan, the execution service works the plan, and
//! the ledger absorbs the results.

pub mod app;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod market;
pub mod strategy;

pub use app::Application;
pub use config::{AppConfig, OperatingMode};
pub use error::{AppError, AppResult};
pub use strategy::{ConstantMixStrategy, StrategyProvider};
