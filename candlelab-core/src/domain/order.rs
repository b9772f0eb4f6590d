//! Order types, lifecycle states and bracket roles.

use super::ids::OrderId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Fills at the open of the first bar it is eligible on.
    Market,
    /// Fills at the limit price or better once the bar range reaches it.
    Limit,
    /// Fills once the bar range crosses the stop price.
    Stop,
}

/// Order lifecycle states. Transitions only move forward:
/// `Pending → Active → Completed | Cancelled | Rejected`, or `Pending → Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted but not yet eligible for matching (submitted this bar, or a
    /// bracket child waiting for its primary).
    Pending,
    /// Eligible for matching against incoming bars.
    Active,
    Completed,
    Cancelled { reason: String },
    /// Could not be executed when it came up for a fill (e.g. no cash).
    Rejected { reason: String },
}

impl OrderStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Active)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }

    fn stage(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Active => 1,
            _ => 2,
        }
    }

    /// Whether moving from `self` to `to` respects the forward-only state machine.
    pub fn can_transition_to(&self, to: &OrderStatus) -> bool {
        if self.is_terminal() || to.stage() <= self.stage() {
            return false;
        }
        // Completion and rejection require the order to have been matchable.
        !matches!(
            (self, to),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Rejected { .. })
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Active => write!(f, "active"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Cancelled { reason } => write!(f, "cancelled ({reason})"),
            OrderStatus::Rejected { reason } => write!(f, "rejected ({reason})"),
        }
    }
}

/// Position of an order inside a bracket group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderRole {
    /// Standalone order or the entry leg of a bracket.
    Primary,
    StopChild,
    LimitChild,
}

/// A single order in the order book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub side: OrderSide,
    pub kind: OrderKind,
    /// Limit or stop price; `None` for market orders.
    pub price: Option<f64>,
    pub size: f64,
    pub status: OrderStatus,
    /// Bracket primary for child legs.
    pub parent_id: Option<OrderId>,
    pub role: OrderRole,
    pub created_bar: usize,
    /// Bar on which a bracket child was activated. Children are not matched on
    /// their activation bar, only from the next one.
    pub activated_bar: Option<usize>,
    pub executed_price: Option<f64>,
    pub executed_bar: Option<usize>,
}

impl Order {
    pub fn new(
        id: OrderId,
        side: OrderSide,
        kind: OrderKind,
        price: Option<f64>,
        size: f64,
        created_bar: usize,
    ) -> Self {
        Self {
            id,
            side,
            kind,
            price,
            size,
            status: OrderStatus::Pending,
            parent_id: None,
            role: OrderRole::Primary,
            created_bar,
            activated_bar: None,
            executed_price: None,
            executed_bar: None,
        }
    }

    /// Attach this order to a bracket primary as a child leg.
    pub fn as_child(mut self, parent: OrderId, role: OrderRole) -> Self {
        self.parent_id = Some(parent);
        self.role = role;
        self
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Order intent validation failure. The intent is dropped; no order is created.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("invalid order: size must be a positive finite number, got {0}")]
    InvalidSize(f64),

    #[error("invalid order: {kind:?} order needs a positive finite price, got {price:?}")]
    InvalidPrice { kind: OrderKind, price: Option<f64> },

    #[error("invalid order: bracket {leg} price {price} is on the wrong side of entry {entry}")]
    InvalidBracket {
        leg: &'static str,
        price: f64,
        entry: f64,
    },
}

/// Validate size and price of an order before it enters the book.
pub fn validate_order(kind: OrderKind, price: Option<f64>, size: f64) -> Result<(), OrderError> {
    if !size.is_finite() || size <= 0.0 {
        return Err(OrderError::InvalidSize(size));
    }
    match kind {
        OrderKind::Market => Ok(()),
        OrderKind::Limit | OrderKind::Stop => match price {
            Some(p) if p.is_finite() && p > 0.0 => Ok(()),
            _ => Err(OrderError::InvalidPrice { kind, price }),
        },
    }
}

/// Audit trail entry for an order state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAuditEntry {
    pub order_id: OrderId,
    pub bar_index: usize,
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub reason: String,
}

/// Lifecycle notification delivered to the strategy after each bar's resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub bar_index: usize,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub role: OrderRole,
    pub status: OrderStatus,
    /// Execution price for completed orders.
    pub price: Option<f64>,
    pub size: f64,
}

impl OrderEvent {
    pub fn from_order(order: &Order, bar_index: usize) -> Self {
        Self {
            order_id: order.id,
            bar_index,
            side: order.side,
            kind: order.kind,
            role: order.role,
            status: order.status.clone(),
            price: order.executed_price,
            size: order.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_forward_only() {
        let pending = OrderStatus::Pending;
        let active = OrderStatus::Active;
        let cancelled = OrderStatus::Cancelled {
            reason: "user".into(),
        };

        assert!(pending.can_transition_to(&active));
        assert!(pending.can_transition_to(&cancelled));
        assert!(!pending.can_transition_to(&OrderStatus::Completed));
        assert!(active.can_transition_to(&OrderStatus::Completed));
        assert!(!active.can_transition_to(&pending));
        assert!(!OrderStatus::Completed.can_transition_to(&cancelled));
        assert!(!cancelled.can_transition_to(&active));
    }

    #[test]
    fn validate_rejects_bad_intents() {
        assert_eq!(
            validate_order(OrderKind::Market, None, 0.0),
            Err(OrderError::InvalidSize(0.0))
        );
        assert!(validate_order(OrderKind::Market, None, f64::NAN).is_err());
        assert!(validate_order(OrderKind::Limit, None, 1.0).is_err());
        assert!(validate_order(OrderKind::Stop, Some(-5.0), 1.0).is_err());
        assert!(validate_order(OrderKind::Stop, Some(f64::INFINITY), 1.0).is_err());
        assert!(validate_order(OrderKind::Limit, Some(100.0), 1.0).is_ok());
        assert!(validate_order(OrderKind::Market, None, 0.5).is_ok());
    }

    #[test]
    fn side_helpers() {
        assert_eq!(OrderSide::Buy.sign(), 1.0);
        assert_eq!(OrderSide::Sell.sign(), -1.0);
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
    }

    #[test]
    fn child_orders_carry_parent() {
        let child = Order::new(OrderId(2), OrderSide::Sell, OrderKind::Stop, Some(95.0), 1.0, 0)
            .as_child(OrderId(1), OrderRole::StopChild);
        assert!(child.is_child());
        assert_eq!(child.parent_id, Some(OrderId(1)));
        assert_eq!(child.status, OrderStatus::Pending);
    }
}
