//! Portfolio ledger for the helm trading control plane.
//!
//! Replays trade and cash-flow history into weighted-average-cost
//! positions, realized/unrealized PnL, and equity, and detects drift
//! between the local view and exchange-reported balances. Replay from
//! empty state is deterministic: it is the recovery path after a restart.

pub mod ledger;
pub mod position;
pub mod records;

pub use ledger::{LedgerConfig, PortfolioLedger};
pub use position::{AssetBalance, SpotPosition};
pub use records::{
    CashFlowKind, CashFlowRecord, PairSnapshot, PortfolioSnapshot, RealizedPnlRecord, TradeRecord,
};
