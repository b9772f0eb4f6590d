//! Hull Moving Average (HMA).
//!
//! HMA = WMA(2 * WMA(close, period / 2) - WMA(close, period), floor(sqrt(period))).
//! First value after `period + floor(sqrt(period)) - 1` bars.

use super::{Indicator, ValueHistory};
use crate::domain::Bar;
use std::collections::VecDeque;

/// Linearly weighted mean; the newest input carries weight `period`.
#[derive(Debug, Clone)]
pub struct RollingWma {
    period: usize,
    window: VecDeque<f64>,
    denom: f64,
}

impl RollingWma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            denom: (period * (period + 1)) as f64 / 2.0,
        }
    }

    pub fn push(&mut self, x: f64) -> Option<f64> {
        self.window.push_back(x);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        if self.window.len() < self.period {
            return None;
        }
        let weighted: f64 = self
            .window
            .iter()
            .enumerate()
            .map(|(i, v)| (i + 1) as f64 * v)
            .sum();
        Some(weighted / self.denom)
    }
}

#[derive(Debug, Clone)]
pub struct Hma {
    period: usize,
    sqrt_period: usize,
    name: String,
    half: RollingWma,
    full: RollingWma,
    smooth: RollingWma,
    history: ValueHistory,
}

impl Hma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "HMA period must be >= 2");
        let half_period = (period / 2).max(1);
        let sqrt_period = ((period as f64).sqrt().floor() as usize).max(1);
        Self {
            period,
            sqrt_period,
            name: format!("hma_{period}"),
            half: RollingWma::new(half_period),
            full: RollingWma::new(period),
            smooth: RollingWma::new(sqrt_period),
            history: ValueHistory::default(),
        }
    }
}

impl Indicator for Hma {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_period(&self) -> usize {
        self.period + self.sqrt_period - 1
    }

    fn update(&mut self, bar: &Bar) {
        let half = self.half.push(bar.close);
        let full = self.full.push(bar.close);
        let v = match (half, full) {
            (Some(h), Some(f)) => self.smooth.push(2.0 * h - f),
            _ => None,
        };
        self.history.push(v);
    }

    fn history(&self) -> &ValueHistory {
        &self.history
    }
}
