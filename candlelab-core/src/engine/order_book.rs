//! Order book — registry of every order in a run and its lifecycle.
//!
//! The book owns:
//! - order storage keyed by id (live and historical)
//! - state transitions, which only move forward
//! - bracket linkage (children reference their primary through `parent_id`)
//! - an audit trail with one entry per transition
//!
//! It does not decide whether or at what price an order fills; that is the
//! broker's job. The book only records what the broker decided.

use crate::domain::{Order, OrderAuditEntry, OrderId, OrderRole, OrderStatus};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderBookError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {0} already exists")]
    DuplicateOrder(OrderId),

    #[error("invalid transition for order {id}: {from} → {to}")]
    InvalidTransition {
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
}

#[derive(Debug, Default)]
pub struct OrderBook {
    orders: BTreeMap<OrderId, Order>,
    audit_trail: Vec<OrderAuditEntry>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// All orders in id order.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Register a standalone order. It must be Pending.
    pub fn submit(&mut self, order: Order) -> Result<(), OrderBookError> {
        debug_assert!(
            order.status == OrderStatus::Pending,
            "submitted order must be Pending"
        );
        if self.orders.contains_key(&order.id) {
            return Err(OrderBookError::DuplicateOrder(order.id));
        }
        self.orders.insert(order.id, order);
        Ok(())
    }

    /// Register a bracket group. Children stay Pending until the primary fills.
    pub fn submit_bracket(
        &mut self,
        primary: Order,
        stop: Option<Order>,
        limit: Option<Order>,
    ) -> Result<(), OrderBookError> {
        let primary_id = primary.id;
        let children: Vec<Order> = stop.into_iter().chain(limit).collect();
        for child in &children {
            debug_assert_eq!(child.parent_id, Some(primary_id));
            if child.id == primary_id || self.orders.contains_key(&child.id) {
                return Err(OrderBookError::DuplicateOrder(child.id));
            }
        }
        self.submit(primary)?;
        for child in children {
            self.orders.insert(child.id, child);
        }
        Ok(())
    }

    /// Children of a bracket primary, in id order.
    pub fn children_of(&self, parent: OrderId) -> Vec<&Order> {
        self.orders
            .values()
            .filter(|o| o.parent_id == Some(parent))
            .collect()
    }

    /// Pending and active orders, in id order.
    pub fn live_orders(&self) -> Vec<&Order> {
        self.orders.values().filter(|o| o.is_live()).collect()
    }

    pub fn has_live_orders(&self) -> bool {
        self.orders.values().any(|o| o.is_live())
    }

    /// Make a pending order eligible for matching.
    pub fn activate(&mut self, id: OrderId, bar_index: usize) -> Result<(), OrderBookError> {
        self.transition(id, OrderStatus::Active, bar_index, "activated")?;
        if let Some(order) = self.orders.get_mut(&id) {
            order.activated_bar = Some(bar_index);
        }
        Ok(())
    }

    /// Activate the pending children of a filled primary. Returns the ids activated.
    pub fn activate_children(
        &mut self,
        parent: OrderId,
        bar_index: usize,
    ) -> Result<Vec<OrderId>, OrderBookError> {
        let ids: Vec<OrderId> = self
            .children_of(parent)
            .into_iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .map(|o| o.id)
            .collect();
        for &id in &ids {
            self.activate(id, bar_index)?;
        }
        Ok(ids)
    }

    /// Set the size of every live child of `parent`. Returns the ids resized.
    pub fn resize_children(&mut self, parent: OrderId, size: f64) -> Vec<OrderId> {
        let mut resized = Vec::new();
        for order in self.orders.values_mut() {
            if order.parent_id == Some(parent) && order.is_live() {
                order.size = size;
                resized.push(order.id);
            }
        }
        resized
    }

    /// Mark an active order as filled at `price`.
    pub fn complete(
        &mut self,
        id: OrderId,
        price: f64,
        size: f64,
        bar_index: usize,
    ) -> Result<(), OrderBookError> {
        self.transition(id, OrderStatus::Completed, bar_index, "filled")?;
        if let Some(order) = self.orders.get_mut(&id) {
            order.executed_price = Some(price);
            order.executed_bar = Some(bar_index);
            order.size = size;
        }
        Ok(())
    }

    /// Mark an active order as rejected at fill time.
    pub fn reject(
        &mut self,
        id: OrderId,
        bar_index: usize,
        reason: &str,
    ) -> Result<(), OrderBookError> {
        self.transition(
            id,
            OrderStatus::Rejected {
                reason: reason.to_string(),
            },
            bar_index,
            reason,
        )
    }

    /// Cancel an order, cascading to the live children of a bracket primary.
    ///
    /// Idempotent: cancelling a terminal order is a no-op. Returns the ids that
    /// were actually cancelled (possibly empty).
    pub fn cancel(
        &mut self,
        id: OrderId,
        bar_index: usize,
        reason: &str,
    ) -> Result<Vec<OrderId>, OrderBookError> {
        let order = self
            .orders
            .get(&id)
            .ok_or(OrderBookError::OrderNotFound(id))?;
        if order.status.is_terminal() {
            return Ok(Vec::new());
        }
        let role = order.role;

        self.transition(
            id,
            OrderStatus::Cancelled {
                reason: reason.to_string(),
            },
            bar_index,
            reason,
        )?;
        let mut cancelled = vec![id];

        if role == OrderRole::Primary {
            let children: Vec<OrderId> = self
                .children_of(id)
                .into_iter()
                .filter(|o| o.is_live())
                .map(|o| o.id)
                .collect();
            for child in children {
                self.transition(
                    child,
                    OrderStatus::Cancelled {
                        reason: "parent cancelled".into(),
                    },
                    bar_index,
                    "parent cancelled",
                )?;
                cancelled.push(child);
            }
        }
        Ok(cancelled)
    }

    /// Cancel the live siblings of a filled bracket child.
    pub fn cancel_siblings(
        &mut self,
        id: OrderId,
        bar_index: usize,
    ) -> Result<Vec<OrderId>, OrderBookError> {
        let Some(parent) = self.orders.get(&id).and_then(|o| o.parent_id) else {
            return Ok(Vec::new());
        };
        let siblings: Vec<OrderId> = self
            .children_of(parent)
            .into_iter()
            .filter(|o| o.id != id && o.is_live())
            .map(|o| o.id)
            .collect();
        let mut cancelled = Vec::new();
        for sibling in siblings {
            cancelled.extend(self.cancel(sibling, bar_index, "sibling filled")?);
        }
        Ok(cancelled)
    }

    pub fn audit_trail(&self) -> &[OrderAuditEntry] {
        &self.audit_trail
    }

    /// Audit entries for a single order, oldest first.
    pub fn audit_for(&self, id: OrderId) -> Vec<&OrderAuditEntry> {
        self.audit_trail
            .iter()
            .filter(|e| e.order_id == id)
            .collect()
    }

    fn transition(
        &mut self,
        id: OrderId,
        to: OrderStatus,
        bar_index: usize,
        reason: &str,
    ) -> Result<(), OrderBookError> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or(OrderBookError::OrderNotFound(id))?;
        if !order.status.can_transition_to(&to) {
            return Err(OrderBookError::InvalidTransition {
                id,
                from: order.status.clone(),
                to,
            });
        }
        let from = std::mem::replace(&mut order.status, to.clone());
        self.audit_trail.push(OrderAuditEntry {
            order_id: id,
            bar_index,
            from_status: from,
            to_status: to,
            reason: reason.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderKind, OrderSide};

    fn market(id: u64) -> Order {
        Order::new(OrderId(id), OrderSide::Buy, OrderKind::Market, None, 1.0, 0)
    }

    fn bracket(book: &mut OrderBook) {
        let primary = Order::new(OrderId(1), OrderSide::Buy, OrderKind::Limit, Some(100.0), 1.0, 0);
        let stop = Order::new(OrderId(2), OrderSide::Sell, OrderKind::Stop, Some(96.0), 1.0, 0)
            .as_child(OrderId(1), OrderRole::StopChild);
        let limit = Order::new(OrderId(3), OrderSide::Sell, OrderKind::Limit, Some(108.0), 1.0, 0)
            .as_child(OrderId(1), OrderRole::LimitChild);
        book.submit_bracket(primary, Some(stop), Some(limit)).unwrap();
    }

    #[test]
    fn submit_and_complete() {
        let mut book = OrderBook::new();
        book.submit(market(1)).unwrap();
        assert_eq!(book.live_orders().len(), 1);

        book.activate(OrderId(1), 1).unwrap();
        book.complete(OrderId(1), 101.0, 1.0, 1).unwrap();

        let order = book.get(OrderId(1)).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.executed_price, Some(101.0));
        assert!(book.live_orders().is_empty());
        assert_eq!(book.audit_trail().len(), 2);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut book = OrderBook::new();
        book.submit(market(1)).unwrap();
        assert_eq!(
            book.submit(market(1)),
            Err(OrderBookError::DuplicateOrder(OrderId(1)))
        );
    }

    #[test]
    fn pending_cannot_complete() {
        let mut book = OrderBook::new();
        book.submit(market(1)).unwrap();
        assert!(matches!(
            book.complete(OrderId(1), 100.0, 1.0, 0),
            Err(OrderBookError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut book = OrderBook::new();
        book.submit(market(1)).unwrap();
        assert_eq!(book.cancel(OrderId(1), 0, "user").unwrap(), vec![OrderId(1)]);
        assert!(book.cancel(OrderId(1), 1, "user").unwrap().is_empty());
        assert!(book.cancel(OrderId(1), 2, "again").unwrap().is_empty());
        assert_eq!(book.audit_for(OrderId(1)).len(), 1);
    }

    #[test]
    fn cancel_unknown_order_fails() {
        let mut book = OrderBook::new();
        assert_eq!(
            book.cancel(OrderId(9), 0, "user"),
            Err(OrderBookError::OrderNotFound(OrderId(9)))
        );
    }

    #[test]
    fn bracket_children_wait_for_primary() {
        let mut book = OrderBook::new();
        bracket(&mut book);
        assert_eq!(book.children_of(OrderId(1)).len(), 2);

        book.activate(OrderId(1), 1).unwrap();
        book.complete(OrderId(1), 100.0, 1.0, 1).unwrap();
        let activated = book.activate_children(OrderId(1), 1).unwrap();
        assert_eq!(activated, vec![OrderId(2), OrderId(3)]);
        for child in book.children_of(OrderId(1)) {
            assert_eq!(child.status, OrderStatus::Active);
            assert_eq!(child.activated_bar, Some(1));
        }
    }

    #[test]
    fn resize_children_follows_a_partial_entry() {
        let mut book = OrderBook::new();
        bracket(&mut book);
        book.activate(OrderId(1), 1).unwrap();
        book.complete(OrderId(1), 100.0, 0.4, 1).unwrap();
        assert_eq!(book.resize_children(OrderId(1), 0.4), vec![OrderId(2), OrderId(3)]);
        for child in book.children_of(OrderId(1)) {
            assert_eq!(child.size, 0.4);
        }
        // The primary itself is not a child of anything.
        assert!(book.resize_children(OrderId(2), 1.0).is_empty());
    }

    #[test]
    fn cancelling_primary_cascades_to_children() {
        let mut book = OrderBook::new();
        bracket(&mut book);
        let cancelled = book.cancel(OrderId(1), 0, "user").unwrap();
        assert_eq!(cancelled, vec![OrderId(1), OrderId(2), OrderId(3)]);
        assert!(book.live_orders().is_empty());
    }

    #[test]
    fn child_fill_cancels_sibling() {
        let mut book = OrderBook::new();
        bracket(&mut book);
        book.activate(OrderId(1), 1).unwrap();
        book.complete(OrderId(1), 100.0, 1.0, 1).unwrap();
        book.activate_children(OrderId(1), 1).unwrap();

        book.complete(OrderId(2), 96.0, 1.0, 2).unwrap();
        let cancelled = book.cancel_siblings(OrderId(2), 2).unwrap();
        assert_eq!(cancelled, vec![OrderId(3)]);
        assert!(matches!(
            book.get(OrderId(3)).unwrap().status,
            OrderStatus::Cancelled { .. }
        ));

        // Cancelling the filled primary afterwards touches nothing.
        assert!(book.cancel(OrderId(1), 3, "late").unwrap().is_empty());
    }

    #[test]
    fn audit_trail_records_every_transition() {
        let mut book = OrderBook::new();
        bracket(&mut book);
        book.activate(OrderId(1), 1).unwrap();
        book.complete(OrderId(1), 100.0, 1.0, 1).unwrap();
        book.activate_children(OrderId(1), 1).unwrap();
        book.complete(OrderId(3), 108.0, 1.0, 4).unwrap();
        book.cancel_siblings(OrderId(3), 4).unwrap();

        let trail = book.audit_trail();
        assert_eq!(trail.len(), 6);
        assert_eq!(trail[0].from_status, OrderStatus::Pending);
        assert_eq!(trail[0].to_status, OrderStatus::Active);
        assert_eq!(trail.last().unwrap().order_id, OrderId(2));
        assert_eq!(trail.last().unwrap().reason, "sibling filled");
    }
}
