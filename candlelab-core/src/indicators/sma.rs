//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices over a window of `period` bars.
//! First value on the `period`-th bar.

use super::{Indicator, ValueHistory};
use crate::domain::Bar;
use std::collections::VecDeque;

/// Rolling arithmetic mean over the last `period` inputs.
#[derive(Debug, Clone)]
pub struct RollingMean {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl RollingMean {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        }
    }

    /// Push a value; returns the mean once the window is full.
    pub fn push(&mut self, x: f64) -> Option<f64> {
        self.window.push_back(x);
        self.sum += x;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        (self.window.len() == self.period).then(|| self.sum / self.period as f64)
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
    mean: RollingMean,
    history: ValueHistory,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
            mean: RollingMean::new(period),
            history: ValueHistory::default(),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_period(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &Bar) {
        let v = self.mean.push(bar.close);
        self.history.push(v);
    }

    fn history(&self) -> &ValueHistory {
        &self.history
    }
}
