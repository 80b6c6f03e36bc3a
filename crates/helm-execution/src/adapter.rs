//! The pluggable submission boundary.

use helm_core::LocalOrder;
use helm_exchange::RemoteOrder;

use crate::error::ExecutionResult;

/// Where orders actually go: the live exchange or an in-process
/// simulation. Selected by configuration; the service is oblivious.
///
/// `submit` records the outcome on the order itself: on return the order
/// is in `validated`, `rejected`, `error`, `open`, or (paper fills)
/// `filled`. An `Err` means a transport-level failure that the plan
/// should surface, and the order has already been moved to a terminal
/// state before it is returned.
pub trait ExecutionAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn submit(&self, order: &mut LocalOrder) -> ExecutionResult<()>;

    /// Cancel one working order.
    fn cancel(&self, order: &LocalOrder) -> ExecutionResult<()>;

    /// Cancel everything working on the venue. Returns the venue-side
    /// cancel count.
    fn cancel_all(&self) -> ExecutionResult<u32>;

    /// Refresh the dead-man switch. No-op for paper.
    fn heartbeat(&self) -> ExecutionResult<()>;

    /// Venue view of working orders, for reconciliation.
    fn open_orders(&self) -> ExecutionResult<Vec<RemoteOrder>>;

    /// Venue view of recently finished orders, for reconciliation.
    fn closed_orders(&self) -> ExecutionResult<Vec<RemoteOrder>>;
}
