//! BarSeries — validated, time-ordered bars behind a forward-only cursor.
//!
//! The cursor starts before the first bar. `advance()` moves it one bar forward
//! and never rewinds; bars already passed stay readable through `lookback()`.

use super::bar::Bar;
use crate::data::provider::DataError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Lookback or index request outside the available history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("bar index {index} out of range (series has {len} bars)")]
    OutOfRange { index: usize, len: usize },

    #[error("lookback {lookback} exceeds available history ({available} bars seen)")]
    LookbackOutOfRange { lookback: usize, available: usize },
}

/// Open/high/low/close/volume without a timestamp, for map-shaped inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ohlcv {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone)]
pub struct BarSeries {
    bars: Vec<Bar>,
    /// Index of the current bar; `None` until the first `advance()`.
    cursor: Option<usize>,
}

impl BarSeries {
    /// Validate and wrap a bar vector.
    ///
    /// Fails on an empty series, non-finite fields, insane OHLC ranges and
    /// non-increasing timestamps.
    pub fn new(bars: Vec<Bar>) -> Result<Self, DataError> {
        validate_bars(&bars)?;
        Ok(Self { bars, cursor: None })
    }

    /// Build from a timestamp-keyed map. Key order guarantees monotonic timestamps.
    pub fn from_map(map: BTreeMap<DateTime<Utc>, Ohlcv>) -> Result<Self, DataError> {
        let bars = map
            .into_iter()
            .map(|(ts, v)| Bar::new(ts, v.open, v.high, v.low, v.close, v.volume))
            .collect();
        Self::new(bars)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Absolute access by index.
    pub fn at(&self, index: usize) -> Result<&Bar, SeriesError> {
        self.bars.get(index).ok_or(SeriesError::OutOfRange {
            index,
            len: self.bars.len(),
        })
    }

    /// Move the cursor one bar forward. Returns `None` at end of series.
    pub fn advance(&mut self) -> Option<&Bar> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next >= self.bars.len() {
            // Park the cursor on the last bar so lookback stays valid.
            return None;
        }
        self.cursor = Some(next);
        self.bars.get(next)
    }

    /// Index of the current bar.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Bar> {
        self.cursor.and_then(|c| self.bars.get(c))
    }

    /// Bar `lookback` bars before the cursor (0 = current bar).
    pub fn lookback(&self, lookback: usize) -> Result<&Bar, SeriesError> {
        let seen = self.cursor.map_or(0, |c| c + 1);
        if lookback >= seen {
            return Err(SeriesError::LookbackOutOfRange {
                lookback,
                available: seen,
            });
        }
        Ok(&self.bars[seen - 1 - lookback])
    }

    /// Bars from the start up to and including the cursor.
    pub fn history(&self) -> &[Bar] {
        match self.cursor {
            Some(c) => &self.bars[..=c],
            None => &[],
        }
    }

    /// The full underlying series, regardless of cursor position.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

/// Check the bar-source contract: non-empty, finite, sane, strictly increasing timestamps.
pub fn validate_bars(bars: &[Bar]) -> Result<(), DataError> {
    if bars.is_empty() {
        return Err(DataError::EmptySeries);
    }
    for (index, bar) in bars.iter().enumerate() {
        if let Some(field) = bar.non_finite_field() {
            return Err(DataError::NonFinite { index, field });
        }
        if !bar.is_sane() {
            return Err(DataError::InsaneBar { index });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(DataError::NonMonotonic {
                index,
                timestamp: bar.timestamp,
            });
        }
    }
    Ok(())
}
