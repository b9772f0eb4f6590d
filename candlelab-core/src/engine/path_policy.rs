//! Path policy — order of evaluation when one bar could fill several orders.
//!
//! OHLC bars do not say whether the high or the low came first. When a bar's
//! range covers both legs of a bracket, the policy decides which is checked
//! first; the first fill cancels its sibling.

use crate::domain::{Bar, Order, OrderId, OrderKind, OrderSide, PositionSide};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPolicy {
    /// Adverse orders (protective stops) first.
    #[default]
    WorstCase,
    /// Favorable orders (take-profits) first.
    BestCase,
    /// Infer the intrabar path from the bar shape.
    Deterministic,
}

impl fmt::Display for PathPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PathPolicy::WorstCase => "worst_case",
            PathPolicy::BestCase => "best_case",
            PathPolicy::Deterministic => "deterministic",
        };
        f.write_str(s)
    }
}

impl FromStr for PathPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "worst_case" | "worst" => Ok(PathPolicy::WorstCase),
            "best_case" | "best" => Ok(PathPolicy::BestCase),
            "deterministic" => Ok(PathPolicy::Deterministic),
            other => Err(format!(
                "unknown path policy '{other}' (expected worst_case, best_case or deterministic)"
            )),
        }
    }
}

/// Evaluation order for the orders eligible on `bar`.
///
/// `orders` is expected in id order; within each class that order is kept.
pub fn evaluation_sequence(
    orders: &[&Order],
    position_side: Option<PositionSide>,
    policy: PathPolicy,
    bar: &Bar,
) -> Vec<OrderId> {
    if orders.len() <= 1 {
        return orders.iter().map(|o| o.id).collect();
    }

    match policy {
        PathPolicy::WorstCase => partition(orders, position_side, true),
        PathPolicy::BestCase => partition(orders, position_side, false),
        PathPolicy::Deterministic => path_order(orders, bar),
    }
}

fn partition(
    orders: &[&Order],
    position_side: Option<PositionSide>,
    adverse_first: bool,
) -> Vec<OrderId> {
    let (adverse, favorable): (Vec<&&Order>, Vec<&&Order>) = orders
        .iter()
        .partition(|o| is_adverse(o, position_side));
    let (first, second) = if adverse_first {
        (adverse, favorable)
    } else {
        (favorable, adverse)
    };
    first.into_iter().chain(second).map(|o| o.id).collect()
}

/// If the open is closer to the high, assume Open → High → Low → Close,
/// otherwise Open → Low → High → Close, and sort trigger prices along that path.
fn path_order(orders: &[&Order], bar: &Bar) -> Vec<OrderId> {
    let high_first = (bar.open - bar.high).abs() <= (bar.open - bar.low).abs();

    let mut with_prices: Vec<(OrderId, f64)> = orders
        .iter()
        .map(|o| (o.id, o.price.unwrap_or(bar.open)))
        .collect();

    with_prices.sort_by(|a, b| {
        let a_up = a.1 >= bar.open;
        let b_up = b.1 >= bar.open;
        match (a_up, b_up) {
            (true, false) if high_first => Ordering::Less,
            (false, true) if high_first => Ordering::Greater,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            // Above the open: the lower price is reached first.
            (true, true) => a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal),
            // Below the open: the higher price is reached first.
            (false, false) => b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal),
        }
    });

    with_prices.into_iter().map(|(id, _)| id).collect()
}

/// Stops that close a position at a loss are adverse; when flat, stop entries are.
fn is_adverse(order: &Order, position_side: Option<PositionSide>) -> bool {
    if order.kind != OrderKind::Stop {
        return false;
    }
    match position_side {
        Some(PositionSide::Long) => order.side == OrderSide::Sell,
        Some(PositionSide::Short) => order.side == OrderSide::Buy,
        None => true,
    }
}
