//! Incremental indicators.
//!
//! Each indicator is a state machine advanced once per bar by the engine loop.
//! Every output is appended to a `ValueHistory`, so strategies read current and
//! past values through `value(lookback)` and never see a bar the loop has not
//! delivered yet.
//!
//! Multi-line indicators (Stochastic RSI) are exposed as separate named
//! instances per line, keeping the single-output `Indicator` trait unchanged.

pub mod atr;
pub mod ema;
pub mod hma;
pub mod rsi;
pub mod sma;
pub mod stoch_rsi;
pub mod supertrend;

pub use atr::Atr;
pub use ema::Ema;
pub use hma::Hma;
pub use rsi::Rsi;
pub use sma::Sma;
pub use stoch_rsi::{StochRsi, StochRsiLine};
pub use supertrend::Supertrend;

use crate::domain::Bar;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error(
        "indicator '{name}' has no value {lookback} bar(s) back \
         (needs {warmup} bars, {seen} seen)"
    )]
    InsufficientHistory {
        name: String,
        lookback: usize,
        warmup: usize,
        seen: usize,
    },

    #[error("indicator '{0}' is not registered")]
    Unknown(String),
}

/// Trait for incremental indicators.
///
/// # Look-ahead guard
/// `update` only ever sees the bar being delivered; the value at bar t cannot
/// depend on bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Stable name (e.g. "sma_50", "supertrend_12_3"). Used as the lookup key.
    fn name(&self) -> &str;

    /// Number of bars consumed before the first value is produced.
    fn warmup_period(&self) -> usize;

    /// Advance by one bar.
    fn update(&mut self, bar: &Bar);

    /// One entry per bar seen; `None` during warmup.
    fn history(&self) -> &ValueHistory;

    /// Value `lookback` bars ago (0 = current bar).
    fn value(&self, lookback: usize) -> Result<f64, IndicatorError> {
        self.history()
            .value(self.name(), self.warmup_period(), lookback)
    }

    fn is_ready(&self) -> bool {
        self.value(0).is_ok()
    }
}

/// Append-only per-bar output of one indicator.
#[derive(Debug, Clone, Default)]
pub struct ValueHistory {
    values: Vec<Option<f64>>,
}

impl ValueHistory {
    pub fn push(&mut self, value: Option<f64>) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    pub fn as_slice(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn value(&self, name: &str, warmup: usize, lookback: usize) -> Result<f64, IndicatorError> {
        let seen = self.values.len();
        let insufficient = || IndicatorError::InsufficientHistory {
            name: name.to_string(),
            lookback,
            warmup,
            seen,
        };
        if lookback >= seen {
            return Err(insufficient());
        }
        self.values[seen - 1 - lookback].ok_or_else(insufficient)
    }
}

/// The indicators of one run, keyed by name.
///
/// Registering two indicators with the same name keeps the first; strategies
/// that share an indicator definition share its state.
#[derive(Default)]
pub struct IndicatorSet {
    indicators: Vec<Box<dyn Indicator>>,
    index: BTreeMap<String, usize>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_indicators(indicators: Vec<Box<dyn Indicator>>) -> Self {
        let mut set = Self::new();
        for ind in indicators {
            set.add(ind);
        }
        set
    }

    /// Register an indicator. Returns false when the name is already taken.
    pub fn add(&mut self, indicator: Box<dyn Indicator>) -> bool {
        if self.index.contains_key(indicator.name()) {
            return false;
        }
        self.index
            .insert(indicator.name().to_string(), self.indicators.len());
        self.indicators.push(indicator);
        true
    }

    /// Advance every indicator by one bar, in registration order.
    pub fn update(&mut self, bar: &Bar) {
        for ind in &mut self.indicators {
            ind.update(bar);
        }
    }

    pub fn get(&self, name: &str) -> Result<&dyn Indicator, IndicatorError> {
        self.index
            .get(name)
            .map(|&i| self.indicators[i].as_ref())
            .ok_or_else(|| IndicatorError::Unknown(name.to_string()))
    }

    pub fn value(&self, name: &str, lookback: usize) -> Result<f64, IndicatorError> {
        self.get(name)?.value(lookback)
    }

    pub fn all_ready(&self) -> bool {
        self.indicators.iter().all(|i| i.is_ready())
    }

    /// Longest warmup among registered indicators.
    pub fn max_warmup(&self) -> usize {
        self.indicators
            .iter()
            .map(|i| i.warmup_period())
            .max()
            .unwrap_or(0)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(|i| i.name())
    }

    /// Current value of every indicator, by name.
    pub fn snapshot(&self) -> BTreeMap<String, Option<f64>> {
        self.indicators
            .iter()
            .map(|i| (i.name().to_string(), i.value(0).ok()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

impl fmt::Debug for IndicatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Create hourly bars from close prices for testing.
///
/// open = prev_close (or close for the first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::TimeZone;
    let t0 = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                t0 + chrono::Duration::hours(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000.0,
            )
        })
        .collect()
}

/// Feed bars through an indicator and collect its outputs.
#[cfg(test)]
pub fn run_indicator(ind: &mut dyn Indicator, bars: &[Bar]) -> Vec<Option<f64>> {
    for bar in bars {
        ind.update(bar);
    }
    ind.history().as_slice().to_vec()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-9;
