//! Trigger checking — does a bar fill a given order, and at what price?
//!
//! Market orders fill at the open. Limit orders fill at the limit or better;
//! a bar that opens beyond the limit fills at the open. Stop orders fill at
//! the stop, or at the open when the bar gaps through it.

use crate::domain::{Bar, Order, OrderKind, OrderSide};

/// Raw fill price for `order` on `bar`, or `None` when the bar does not reach it.
pub fn fill_price(order: &Order, bar: &Bar) -> Option<f64> {
    match order.kind {
        OrderKind::Market => Some(bar.open),
        OrderKind::Limit => order.price.and_then(|p| check_limit(order.side, p, bar)),
        OrderKind::Stop => order.price.and_then(|p| check_stop(order.side, p, bar)),
    }
}

/// Buy limit: low <= limit, filled at min(open, limit).
/// Sell limit: high >= limit, filled at max(open, limit).
fn check_limit(side: OrderSide, limit: f64, bar: &Bar) -> Option<f64> {
    match side {
        OrderSide::Buy if bar.low <= limit => Some(bar.open.min(limit)),
        OrderSide::Sell if bar.high >= limit => Some(bar.open.max(limit)),
        _ => None,
    }
}

/// Sell stop: low <= stop, filled at min(open, stop).
/// Buy stop: high >= stop, filled at max(open, stop).
fn check_stop(side: OrderSide, stop: f64, bar: &Bar) -> Option<f64> {
    match side {
        OrderSide::Sell if bar.low <= stop => Some(bar.open.min(stop)),
        OrderSide::Buy if bar.high >= stop => Some(bar.open.max(stop)),
        _ => None,
    }
}
