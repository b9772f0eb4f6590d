//! Position tracking for the single instrument of a run.

use super::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }
}

/// Portion of a position that a fill closed out.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedLot {
    pub side: PositionSide,
    pub size: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_bar: usize,
}

/// Signed position. Positive size is long, negative is short, zero is flat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Position {
    pub size: f64,
    pub avg_entry_price: f64,
    pub entry_time: Option<DateTime<Utc>>,
    pub entry_bar: Option<usize>,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.size == 0.0
    }

    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }

    pub fn side(&self) -> Option<PositionSide> {
        if self.is_long() {
            Some(PositionSide::Long)
        } else if self.is_short() {
            Some(PositionSide::Short)
        } else {
            None
        }
    }

    pub fn market_value(&self, mark: f64) -> f64 {
        self.size * mark
    }

    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        self.size * (mark - self.avg_entry_price)
    }

    /// Apply a fill and return the closed portion, if the fill reduced or flipped the position.
    ///
    /// Adding to a position re-averages the entry price. A fill larger than the
    /// open size closes it fully and opens the remainder on the other side at
    /// the fill price.
    pub fn apply_fill(
        &mut self,
        side: OrderSide,
        size: f64,
        price: f64,
        bar_index: usize,
        time: DateTime<Utc>,
    ) -> Option<ClosedLot> {
        let delta = side.sign() * size;

        if self.is_flat() || self.size.signum() == delta.signum() {
            let new_size = self.size + delta;
            self.avg_entry_price =
                (self.size.abs() * self.avg_entry_price + size * price) / new_size.abs();
            if self.is_flat() {
                self.entry_time = Some(time);
                self.entry_bar = Some(bar_index);
            }
            self.size = new_size;
            return None;
        }

        let open = self.size.abs();
        let closed_size = size.min(open);
        let closed = ClosedLot {
            side: self.side()?,
            size: closed_size,
            entry_price: self.avg_entry_price,
            entry_time: self.entry_time.unwrap_or(time),
            entry_bar: self.entry_bar.unwrap_or(bar_index),
        };

        let remaining = size - closed_size;
        if remaining > 0.0 {
            self.size = side.sign() * remaining;
            self.avg_entry_price = price;
            self.entry_time = Some(time);
            self.entry_bar = Some(bar_index);
        } else {
            self.size += delta;
            if self.size.abs() < 1e-12 * open.max(1.0) {
                *self = Position::default();
            }
        }
        Some(closed)
    }
}
