//! Order management for the helm trading control plane.
//!
//! Consumes execution plans from the risk engine, applies notional and
//! concurrency guardrails, submits through a pluggable adapter (live
//! exchange or in-process paper fills), tracks order lifecycle, and
//! reconciles local state against the exchange. Every order and every
//! plan outcome is persisted, including rejections: the audit trail must
//! show what was refused, not only what ran.

pub mod adapter;
pub mod config;
pub mod error;
pub mod live;
pub mod paper;
pub mod service;

pub use adapter::ExecutionAdapter;
pub use config::ExecutionConfig;
pub use error::{ExecutionError, ExecutionResult};
pub use live::LiveAdapter;
pub use paper::PaperAdapter;
pub use service::ExecutionService;
