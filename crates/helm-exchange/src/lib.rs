//! Collaborator contracts for the exchange and market-data subsystems.
//!
//! The transport itself (HTTP signing, connection pooling) lives outside
//! this workspace; these traits define exactly what the execution and
//! portfolio crates need from it, with errors classified so retry policy
//! can be decided locally.

pub mod client;
pub mod error;
pub mod limiter;
pub mod marketdata;

pub use client::{
    ExchangeClient, LedgerEntry, LedgerEntryKind, OrderRequest, OrderResponse, RawBalance,
    RemoteOrder, RemoteOrderStatus, RemoteTrade,
};
pub use error::{ExchangeError, ExchangeResult};
pub use limiter::RateLimiter;
pub use marketdata::{Candle, MarketData, MarketDataError, MarketDataResult};
