//! Stochastic RSI.
//!
//! raw = 100 * (RSI - lowest(RSI, stoch)) / (highest(RSI, stoch) - lowest(RSI, stoch))
//! %K  = SMA(raw, k)
//! %D  = SMA(%K, d)
//!
//! A flat RSI window (highest == lowest) yields raw = 50.

use super::rsi::Rsi;
use super::sma::RollingMean;
use super::{Indicator, ValueHistory};
use crate::domain::Bar;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StochRsiLine {
    K,
    D,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochRsiParams {
    pub k_period: usize,
    pub d_period: usize,
    pub rsi_period: usize,
    pub stoch_period: usize,
}

impl Default for StochRsiParams {
    fn default() -> Self {
        Self {
            k_period: 3,
            d_period: 3,
            rsi_period: 14,
            stoch_period: 14,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StochRsi {
    line: StochRsiLine,
    params: StochRsiParams,
    name: String,
    rsi: Rsi,
    rsi_window: VecDeque<f64>,
    k_mean: RollingMean,
    d_mean: RollingMean,
    history: ValueHistory,
}

impl StochRsi {
    pub fn new(line: StochRsiLine, params: StochRsiParams) -> Self {
        let StochRsiParams {
            k_period,
            d_period,
            rsi_period,
            stoch_period,
        } = params;
        assert!(
            k_period >= 1 && d_period >= 1 && rsi_period >= 1 && stoch_period >= 1,
            "Stochastic RSI periods must be >= 1"
        );
        let tag = match line {
            StochRsiLine::K => "k",
            StochRsiLine::D => "d",
        };
        Self {
            line,
            params,
            name: format!("stoch_rsi_{tag}_{k_period}_{d_period}_{rsi_period}_{stoch_period}"),
            rsi: Rsi::new(rsi_period),
            rsi_window: VecDeque::with_capacity(stoch_period + 1),
            k_mean: RollingMean::new(k_period),
            d_mean: RollingMean::new(d_period),
            history: ValueHistory::default(),
        }
    }

    pub fn k(params: StochRsiParams) -> Self {
        Self::new(StochRsiLine::K, params)
    }

    pub fn d(params: StochRsiParams) -> Self {
        Self::new(StochRsiLine::D, params)
    }

    fn step(&mut self, close: f64) -> Option<f64> {
        let rsi = self.rsi.step(close)?;
        self.rsi_window.push_back(rsi);
        if self.rsi_window.len() > self.params.stoch_period {
            self.rsi_window.pop_front();
        }
        if self.rsi_window.len() < self.params.stoch_period {
            return None;
        }

        let hh = self.rsi_window.iter().copied().fold(f64::MIN, f64::max);
        let ll = self.rsi_window.iter().copied().fold(f64::MAX, f64::min);
        let raw = if hh > ll {
            100.0 * (rsi - ll) / (hh - ll)
        } else {
            50.0
        };

        let k = self.k_mean.push(raw)?;
        match self.line {
            StochRsiLine::K => Some(k),
            StochRsiLine::D => self.d_mean.push(k),
        }
    }
}

impl Indicator for StochRsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_period(&self) -> usize {
        let p = &self.params;
        let k_warmup = p.rsi_period + p.stoch_period + p.k_period - 1;
        match self.line {
            StochRsiLine::K => k_warmup,
            StochRsiLine::D => k_warmup + p.d_period - 1,
        }
    }

    fn update(&mut self, bar: &Bar) {
        let v = self.step(bar.close);
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

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 10.0 * (i as f64 * 0.3).sin())
            .collect()
    }

    #[test]
    fn default_warmups() {
        let p = StochRsiParams::default();
        assert_eq!(StochRsi::k(p).warmup_period(), 30);
        assert_eq!(StochRsi::d(p).warmup_period(), 32);
        assert_eq!(StochRsi::k(p).name(), "stoch_rsi_k_3_3_14_14");
    }

    #[test]
    fn first_values_land_on_warmup() {
        let bars = make_bars(&wave(60));
        let p = StochRsiParams::default();
        let k = run_indicator(&mut StochRsi::k(p), &bars);
        let d = run_indicator(&mut StochRsi::d(p), &bars);
        assert!(k[28].is_none());
        assert!(k[29].is_some());
        assert!(d[30].is_none());
        assert!(d[31].is_some());
    }

    #[test]
    fn values_stay_in_0_100() {
        let bars = make_bars(&wave(200));
        let out = run_indicator(&mut StochRsi::k(StochRsiParams::default()), &bars);
        for v in out.into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn flat_rsi_window_is_midpoint() {
        // Monotonic rise pins RSI at 100, so the stochastic window is flat.
        let closes: Vec<f64> = (0..40).map(|i| 10.0 + i as f64).collect();
        let out = run_indicator(
            &mut StochRsi::k(StochRsiParams::default()),
            &make_bars(&closes),
        );
        assert_approx(out[39].unwrap(), 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn d_is_mean_of_k() {
        let bars = make_bars(&wave(80));
        let p = StochRsiParams::default();
        let k = run_indicator(&mut StochRsi::k(p), &bars);
        let d = run_indicator(&mut StochRsi::d(p), &bars);
        let expected = (k[77].unwrap() + k[78].unwrap() + k[79].unwrap()) / 3.0;
        assert_approx(d[79].unwrap(), expected, DEFAULT_EPSILON);
    }
}
