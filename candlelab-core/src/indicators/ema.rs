//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: the SMA of the first `period` closes, emitted on the `period`-th bar.

use super::{Indicator, ValueHistory};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
    alpha: f64,
    count: usize,
    seed_sum: f64,
    current: Option<f64>,
    history: ValueHistory,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
            alpha: 2.0 / (period as f64 + 1.0),
            count: 0,
            seed_sum: 0.0,
            current: None,
            history: ValueHistory::default(),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_period(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &Bar) {
        self.current = match self.current {
            Some(prev) => Some(self.alpha * bar.close + (1.0 - self.alpha) * prev),
            None => {
                self.count += 1;
                self.seed_sum += bar.close;
                (self.count == self.period).then(|| self.seed_sum / self.period as f64)
            }
        };
        self.history.push(self.current);
    }

    fn history(&self) -> &ValueHistory {
        &self.history
    }
}
