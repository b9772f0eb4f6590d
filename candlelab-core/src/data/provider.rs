//! Bar source trait, bar intervals and structured data errors.
//!
//! The BarSource trait abstracts over where bars come from (Binance klines,
//! the seeded synthetic generator, test fixtures) so the cache and runner can
//! treat them uniformly.

use crate::domain::Bar;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Structured error types for data operations. Fatal before the first engine step.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("bar series is empty")]
    EmptySeries,

    #[error("bar {index}: field '{field}' is not finite")]
    NonFinite { index: usize, field: &'static str },

    #[error("bar {index}: OHLC range is inconsistent or price is not positive")]
    InsaneBar { index: usize },

    #[error("bar {index}: timestamp {timestamp} does not increase")]
    NonMonotonic {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("unsupported interval '{0}'")]
    UnsupportedInterval(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("offline mode: no cached data for {key}")]
    Offline { key: String },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for {key}")]
    NoCachedData { key: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Bar width. Names follow exchange kline notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    Hour4,
    Day1,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Hour1 => "1h",
            Interval::Hour4 => "4h",
            Interval::Day1 => "1d",
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            Interval::Minute1 => Duration::minutes(1),
            Interval::Minute5 => Duration::minutes(5),
            Interval::Minute15 => Duration::minutes(15),
            Interval::Minute30 => Duration::minutes(30),
            Interval::Hour1 => Duration::hours(1),
            Interval::Hour4 => Duration::hours(4),
            Interval::Day1 => Duration::days(1),
        }
    }

    /// Bars per year for a market that trades around the clock.
    pub fn periods_per_year(self) -> f64 {
        let minutes = self.duration().num_minutes() as f64;
        365.0 * 24.0 * 60.0 / minutes
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::Minute1),
            "5m" => Ok(Interval::Minute5),
            "15m" => Ok(Interval::Minute15),
            "30m" => Ok(Interval::Minute30),
            "1h" => Ok(Interval::Hour1),
            "4h" => Ok(Interval::Hour4),
            "1d" => Ok(Interval::Day1),
            other => Err(DataError::UnsupportedInterval(other.to_string())),
        }
    }
}

impl TryFrom<String> for Interval {
    type Error = DataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Interval> for String {
    fn from(i: Interval) -> Self {
        i.as_str().to_string()
    }
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Binance,
    Cache,
    Synthetic,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Binance => write!(f, "binance"),
            DataSource::Cache => write!(f, "cache"),
            DataSource::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// What a fetch is for: one symbol at one interval over `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub interval: Interval,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SeriesKey {
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            start,
            end,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}..{}",
            self.symbol,
            self.interval,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Source of historical bars.
///
/// Implementations return bars ordered by timestamp. The cache layer sits
/// above this trait; sources don't know about the cache.
pub trait BarSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn fetch(&self, key: &SeriesKey) -> Result<Vec<Bar>, DataError>;
}
