//! OrderPort — the only channel through which a strategy affects the broker.
//!
//! Intents collected on bar t are sized, validated and registered after
//! `on_bar` returns; the resulting orders are first matched against bar t+1.

use crate::domain::{OrderId, OrderKind, OrderSide};
use serde::{Deserialize, Serialize};

/// Entry plus protective stop and take-profit, submitted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketIntent {
    pub side: OrderSide,
    /// `Market` or `Limit`.
    pub entry_kind: OrderKind,
    pub entry_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub limit_price: Option<f64>,
    /// `None` lets the engine's sizer decide.
    pub size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderIntent {
    Single {
        side: OrderSide,
        kind: OrderKind,
        price: Option<f64>,
        size: Option<f64>,
    },
    Bracket(BracketIntent),
    /// Flatten the current position with a market order.
    Close,
    Cancel(OrderId),
}

#[derive(Debug, Default)]
pub struct OrderPort {
    intents: Vec<OrderIntent>,
}

impl OrderPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, intent: OrderIntent) {
        self.intents.push(intent);
    }

    /// Market buy sized by the engine's sizer.
    pub fn buy(&mut self) {
        self.market(OrderSide::Buy, None);
    }

    /// Market sell sized by the engine's sizer.
    pub fn sell(&mut self) {
        self.market(OrderSide::Sell, None);
    }

    pub fn market(&mut self, side: OrderSide, size: Option<f64>) {
        self.submit(OrderIntent::Single {
            side,
            kind: OrderKind::Market,
            price: None,
            size,
        });
    }

    pub fn limit(&mut self, side: OrderSide, price: f64, size: Option<f64>) {
        self.submit(OrderIntent::Single {
            side,
            kind: OrderKind::Limit,
            price: Some(price),
            size,
        });
    }

    pub fn stop(&mut self, side: OrderSide, price: f64, size: Option<f64>) {
        self.submit(OrderIntent::Single {
            side,
            kind: OrderKind::Stop,
            price: Some(price),
            size,
        });
    }

    pub fn close(&mut self) {
        self.submit(OrderIntent::Close);
    }

    /// Limit buy at `entry` with a stop-loss below and a take-profit above.
    pub fn buy_bracket(&mut self, entry: f64, stop: f64, take_profit: f64) {
        self.submit(OrderIntent::Bracket(BracketIntent {
            side: OrderSide::Buy,
            entry_kind: OrderKind::Limit,
            entry_price: Some(entry),
            stop_price: Some(stop),
            limit_price: Some(take_profit),
            size: None,
        }));
    }

    /// Limit sell at `entry` with a stop-loss above and a take-profit below.
    pub fn sell_bracket(&mut self, entry: f64, stop: f64, take_profit: f64) {
        self.submit(OrderIntent::Bracket(BracketIntent {
            side: OrderSide::Sell,
            entry_kind: OrderKind::Limit,
            entry_price: Some(entry),
            stop_price: Some(stop),
            limit_price: Some(take_profit),
            size: None,
        }));
    }

    pub fn cancel(&mut self, id: OrderId) {
        self.submit(OrderIntent::Cancel(id));
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Take every pending intent, leaving the port empty.
    pub fn drain(&mut self) -> Vec<OrderIntent> {
        std::mem::take(&mut self.intents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_collects_in_order_and_drains() {
        let mut port = OrderPort::new();
        port.buy();
        port.buy_bracket(100.0, 96.0, 108.0);
        port.cancel(OrderId(3));
        assert_eq!(port.len(), 3);

        let intents = port.drain();
        assert!(port.is_empty());
        assert!(matches!(
            intents[0],
            OrderIntent::Single {
                side: OrderSide::Buy,
                kind: OrderKind::Market,
                size: None,
                ..
            }
        ));
        match &intents[1] {
            OrderIntent::Bracket(b) => {
                assert_eq!(b.entry_kind, OrderKind::Limit);
                assert_eq!(b.stop_price, Some(96.0));
                assert_eq!(b.limit_price, Some(108.0));
            }
            other => panic!("expected bracket, got {other:?}"),
        }
        assert_eq!(intents[2], OrderIntent::Cancel(OrderId(3)));
    }
}
