//! Persistence for the helm trading control plane.
//!
//! Everything durable goes through the [`Store`] trait: orders on every
//! transition, execution reports, trades, cash flows, and portfolio
//! snapshots. The production implementation is [`JsonlStore`], an
//! append-only JSON Lines directory with a schema-versioned manifest;
//! [`MemoryStore`] backs tests.

pub mod error;
pub mod jsonl;
pub mod memory;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use jsonl::{JsonlStore, SCHEMA_VERSION};
pub use memory::MemoryStore;
pub use store::Store;
