//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|), defined from
//! the second bar on. ATR applies Wilder smoothing to it.
//! First value after `period + 1` bars.

use super::{Indicator, ValueHistory};
use crate::domain::Bar;

/// Wilder smoothing: seeded with the mean of the first `period` inputs, then
/// `avg = (avg * (period - 1) + x) / period`.
#[derive(Debug, Clone)]
pub struct Wilder {
    period: usize,
    count: usize,
    seed_sum: f64,
    current: Option<f64>,
}

impl Wilder {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            count: 0,
            seed_sum: 0.0,
            current: None,
        }
    }

    pub fn push(&mut self, x: f64) -> Option<f64> {
        let p = self.period as f64;
        self.current = match self.current {
            Some(avg) => Some((avg * (p - 1.0) + x) / p),
            None => {
                self.count += 1;
                self.seed_sum += x;
                (self.count == self.period).then(|| self.seed_sum / p)
            }
        };
        self.current
    }
}

pub fn true_range(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
    prev_close: Option<f64>,
    smooth: Wilder,
    history: ValueHistory,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
            prev_close: None,
            smooth: Wilder::new(period),
            history: ValueHistory::default(),
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_period(&self) -> usize {
        self.period + 1
    }

    fn update(&mut self, bar: &Bar) {
        let v = self
            .prev_close
            .and_then(|pc| self.smooth.push(true_range(bar, pc)));
        self.prev_close = Some(bar.close);
        self.history.push(v);
    }

    fn history(&self) -> &ValueHistory {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, run_indicator, DEFAULT_EPSILON};

    #[test]
    fn atr_constant_range() {
        // make_bars on a flat series: high - low = 2, no gaps
        let bars = make_bars(&[100.0; 10]);
        let out = run_indicator(&mut Atr::new(3), &bars);
        assert!(out[2].is_none());
        for v in out.iter().skip(3) {
            assert_approx(v.unwrap(), 2.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn true_range_includes_gap() {
        let bars = make_bars(&[100.0, 110.0]);
        // bar 1: open 100, high 111, low 99, prev close 100
        assert_approx(true_range(&bars[1], 100.0), 12.0, DEFAULT_EPSILON);
        assert_approx(true_range(&bars[1], 120.0), 21.0, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_seed_then_smooth() {
        let mut w = Wilder::new(2);
        assert_eq!(w.push(2.0), None);
        assert_eq!(w.push(4.0), Some(3.0));
        assert_eq!(w.push(5.0), Some(4.0));
    }
}
