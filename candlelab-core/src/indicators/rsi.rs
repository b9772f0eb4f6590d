//! Relative Strength Index (RSI).
//!
//! Uses Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! First value after `period + 1` bars.
//! Edge case: avg_loss == 0 → RSI = 100.

use super::atr::Wilder;
use super::{Indicator, ValueHistory};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
    prev_close: Option<f64>,
    gains: Wilder,
    losses: Wilder,
    history: ValueHistory,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
            prev_close: None,
            gains: Wilder::new(period),
            losses: Wilder::new(period),
            history: ValueHistory::default(),
        }
    }

    /// Advance with a raw close and return the new RSI value, if warmed up.
    pub(crate) fn step(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        let change = close - prev;
        let avg_gain = self.gains.push(change.max(0.0));
        let avg_loss = self.losses.push((-change).max(0.0));
        match (avg_gain, avg_loss) {
            (Some(_), Some(l)) if l == 0.0 => Some(100.0),
            (Some(g), Some(l)) => Some(100.0 - 100.0 / (1.0 + g / l)),
            _ => None,
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_period(&self) -> usize {
        self.period + 1
    }

    fn update(&mut self, bar: &Bar) {
        let v = self.step(bar.close);
        self.history.push(v);
    }

    fn history(&self) -> &ValueHistory {
        &self.history
    }
}
