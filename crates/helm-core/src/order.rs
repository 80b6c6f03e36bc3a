//! Local order model and its lifecycle state machine.
//!
//! A `LocalOrder` is owned exclusively by the execution service while open
//! and is persisted on every transition so the in-memory view can always be
//! rebuilt from the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Pair, Price, Size};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Market order, filled at whatever the book gives.
    #[default]
    Market,
    /// Limit order at a bounded price.
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit => write!(f, "limit"),
        }
    }
}

/// Order lifecycle state.
///
/// Transitions: `pending -> {validated | rejected | error | open}`,
/// `open -> {filled | canceled | closed}`. Everything except `pending` and
/// `open` is terminal; a failed order is never retried in place, the caller
/// creates a fresh attempt instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created locally, not yet submitted.
    #[default]
    Pending,
    /// Accepted by the exchange in validate/dry-run mode; never live.
    Validated,
    /// Rejected before or at submission (guardrail or exchange).
    Rejected,
    /// Submission failed after retries, or the response was malformed.
    Error,
    /// Live on the exchange book.
    Open,
    /// Completely filled.
    Filled,
    /// Canceled before completion.
    Canceled,
    /// Closed by the exchange (e.g. expired).
    Closed,
}

impl OrderStatus {
    /// Returns true if no further transitions are allowed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Open)
    }

    /// Returns true if the order is still working (cancellable).
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Open)
    }

    /// Whether the state machine allows moving to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match self {
            Self::Pending => matches!(
                next,
                Self::Validated | Self::Rejected | Self::Error | Self::Open
            ),
            Self::Open => matches!(next, Self::Filled | Self::Canceled | Self::Closed),
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Rejected => "rejected",
            Self::Error => "error",
            Self::Open => "open",
            Self::Filled => "filled",
            Self::Canceled => "canceled",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Process-unique local order id.
///
/// Generated once at order creation and never reused. Format:
/// `helm_{timestamp_ms}_{uuid_short}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalOrderId(String);

impl LocalOrderId {
    /// Create a new unique local order id.
    pub fn generate() -> Self {
        let ts = Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("helm_{ts}_{uuid_short}"))
    }

    /// Rebuild from a stored string.
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for LocalOrderId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

/// An order as tracked by the execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalOrder {
    /// Process-unique id, immutable after creation.
    pub local_id: LocalOrderId,
    /// Plan this order belongs to.
    pub plan_id: String,
    /// Strategy (or comma-joined strategies) that caused it.
    pub strategy: String,
    pub pair: Pair,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Exchange order id, once known. Maps 1:1 to `local_id` for the
    /// lifetime of the process.
    pub remote_id: Option<String>,
    /// Numeric strategy tag sent to the exchange, used for reconciliation
    /// and PnL attribution.
    pub userref: Option<i64>,
    pub requested_size: Size,
    pub requested_price: Option<Price>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Cumulative filled size.
    pub filled_size: Size,
    pub avg_fill_price: Option<Price>,
    pub last_error: Option<String>,
    /// Raw request payload kept for audit.
    pub raw_request: Option<serde_json::Value>,
    /// Raw exchange response kept for audit.
    pub raw_response: Option<serde_json::Value>,
}

impl LocalOrder {
    /// Create a fresh pending order.
    #[must_use]
    pub fn new(
        plan_id: impl Into<String>,
        strategy: impl Into<String>,
        pair: Pair,
        side: OrderSide,
        order_type: OrderType,
        requested_size: Size,
        requested_price: Option<Price>,
    ) -> Self {
        let now = Utc::now();
        Self {
            local_id: LocalOrderId::generate(),
            plan_id: plan_id.into(),
            strategy: strategy.into(),
            pair,
            side,
            order_type,
            remote_id: None,
            userref: None,
            requested_size,
            requested_price,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            filled_size: Size::ZERO,
            avg_fill_price: None,
            last_error: None,
            raw_request: None,
            raw_response: None,
        }
    }

    /// Move to a new status, touching `updated_at`.
    ///
    /// Illegal transitions are ignored with the current status kept; the
    /// caller logs them. Reconciliation may legitimately replay updates for
    /// orders that are already terminal.
    pub fn transition(&mut self, next: OrderStatus) -> bool {
        if self.status == next {
            return true;
        }
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    /// Record a rejection with a reason. Valid from `pending` only.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.last_error = Some(reason.into());
        self.transition(OrderStatus::Rejected);
    }

    /// Record a terminal submission error.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.last_error = Some(reason.into());
        self.transition(OrderStatus::Error);
    }

    /// Update cumulative fill state from exchange data.
    pub fn record_fill(&mut self, filled: Size, avg_price: Option<Price>) {
        self.filled_size = filled;
        if avg_price.is_some() {
            self.avg_fill_price = avg_price;
        }
        self.updated_at = Utc::now();
    }

    /// Remaining unfilled size.
    #[must_use]
    pub fn remaining_size(&self) -> Size {
        self.requested_size - self.filled_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_order() -> LocalOrder {
        LocalOrder::new(
            "plan-1",
            "trend",
            Pair::new("BTC", "USD"),
            OrderSide::Buy,
            OrderType::Market,
            Size::new(dec!(0.5)),
            None,
        )
    }

    #[test]
    fn test_local_id_unique() {
        assert_ne!(LocalOrderId::generate(), LocalOrderId::generate());
    }

    #[test]
    fn test_local_id_format() {
        let id = LocalOrderId::generate();
        assert!(id.as_str().starts_with("helm_"));
    }

    #[test]
    fn test_status_machine() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Open));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Rejected));
        assert!(OrderStatus::Open.can_transition_to(OrderStatus::Filled));
        assert!(!OrderStatus::Open.can_transition_to(OrderStatus::Rejected));
        assert!(!OrderStatus::Filled.can_transition_to(OrderStatus::Open));

        assert!(OrderStatus::Validated.is_terminal());
        assert!(OrderStatus::Error.is_terminal());
        assert!(OrderStatus::Open.is_active());
    }

    #[test]
    fn test_reject_sets_reason() {
        let mut order = sample_order();
        order.reject("max_pair_notional_usd exceeded");
        assert_eq!(order.status, OrderStatus::Rejected);
        assert!(order.last_error.as_deref().unwrap().contains("notional"));
    }

    #[test]
    fn test_terminal_is_sticky() {
        let mut order = sample_order();
        order.fail("boom");
        assert!(!order.transition(OrderStatus::Open));
        assert_eq!(order.status, OrderStatus::Error);
    }

    #[test]
    fn test_record_fill() {
        let mut order = sample_order();
        order.transition(OrderStatus::Open);
        order.record_fill(Size::new(dec!(0.2)), Some(Price::new(dec!(50100))));
        assert_eq!(order.remaining_size(), Size::new(dec!(0.3)));
        assert_eq!(order.avg_fill_price, Some(Price::new(dec!(50100))));
    }
}
