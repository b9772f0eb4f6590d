//! Serializable backtest configuration.
//!
//! A config file is TOML with four sections, all optional:
//!
//! ```toml
//! [backtest]
//! strategy = "MaCross"
//! initial_cash = 1000.0
//! percent = 100.0
//! commission_pct = 0.0
//! path_policy = "worst_case"
//!
//! [data]
//! symbol = "BTCUSDT"
//! interval = "1h"
//! start = "2019-01-01"
//! end = "2022-05-01"
//!
//! [plot]
//! enabled = true
//! save = false
//!
//! [params]
//! fast_length = 50
//! ```
//!
//! Missing fields fall back to the defaults of the classic BTCUSDT hourly run.

use candlelab_core::data::{Interval, SeriesKey};
use candlelab_core::engine::{EngineConfig, ExecutionConfig, PathPolicy, PercentSizer};
use candlelab_core::fingerprint::ContentHash;
use candlelab_core::strategy::{StrategyError, StrategyKind};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::data_loader::LoadOptions;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("cannot save plot when plotting is disabled (--no-plot)")]
    SavePlotWithoutPlot,

    #[error("initial cash must be positive, got {0}")]
    NonPositiveCash(f64),

    #[error("percent must be in (0, 100], got {0}")]
    PercentOutOfRange(f64),

    #[error("lot size must be positive, got {0}")]
    NonPositiveLot(f64),

    #[error("commission must be non-negative, got {0}")]
    NegativeCommission(f64),

    #[error("periods per year must be positive, got {0}")]
    NonPositivePeriods(f64),

    #[error("start date {start} is not before end date {end}")]
    EmptyDateRange { start: NaiveDate, end: NaiveDate },

    #[error("config serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything needed to reproduce one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub backtest: BacktestSection,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub plot: PlotSection,
    /// Overrides for the selected strategy's parameters.
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    /// Strategy selector: MaCross, TripleSupertrend, CrossoverStochRSI or TripleEMaStrategy.
    pub strategy: String,
    pub initial_cash: f64,
    /// Percent of available cash committed per entry.
    pub percent: f64,
    /// Smallest tradable size increment.
    pub lot: f64,
    pub commission_pct: f64,
    pub path_policy: PathPolicy,
    /// Sharpe annualization; derived from the interval when unset.
    pub periods_per_year: Option<f64>,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::MaCross.as_str().to_string(),
            initial_cash: 1_000.0,
            percent: 100.0,
            lot: 0.0001,
            commission_pct: 0.0,
            path_policy: PathPolicy::default(),
            periods_per_year: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub symbol: String,
    pub interval: Interval,
    /// First day of the range (inclusive, UTC midnight).
    pub start: NaiveDate,
    /// Last day of the range (exclusive, UTC midnight).
    pub end: NaiveDate,
    pub cache_dir: PathBuf,
    /// Never touch the network.
    pub offline: bool,
    /// Generate synthetic bars when nothing is cached or fetchable.
    pub synthetic: bool,
    /// Ignore the cached series and fetch it again.
    pub refresh: bool,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval: Interval::Hour1,
            start: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2022, 5, 1).unwrap_or(NaiveDate::MIN),
            cache_dir: PathBuf::from("data"),
            offline: false,
            synthetic: false,
            refresh: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSection {
    pub enabled: bool,
    /// Write the chart data file next to the other artifacts.
    pub save: bool,
    pub output: PathBuf,
}

impl Default for PlotSection {
    fn default() -> Self {
        Self {
            enabled: true,
            save: false,
            output: PathBuf::from("results"),
        }
    }
}

impl BacktestConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Check every rule a run depends on. Nothing runs on an invalid config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kind = self.strategy_kind()?;
        kind.build(&self.params)?;

        if self.plot.save && !self.plot.enabled {
            return Err(ConfigError::SavePlotWithoutPlot);
        }
        let bt = &self.backtest;
        if !(bt.initial_cash.is_finite() && bt.initial_cash > 0.0) {
            return Err(ConfigError::NonPositiveCash(bt.initial_cash));
        }
        if !(bt.percent > 0.0 && bt.percent <= 100.0) {
            return Err(ConfigError::PercentOutOfRange(bt.percent));
        }
        if !(bt.lot.is_finite() && bt.lot > 0.0) {
            return Err(ConfigError::NonPositiveLot(bt.lot));
        }
        if !(bt.commission_pct.is_finite() && bt.commission_pct >= 0.0) {
            return Err(ConfigError::NegativeCommission(bt.commission_pct));
        }
        if let Some(ppy) = bt.periods_per_year {
            if !(ppy.is_finite() && ppy > 0.0) {
                return Err(ConfigError::NonPositivePeriods(ppy));
            }
        }
        if self.data.start >= self.data.end {
            return Err(ConfigError::EmptyDateRange {
                start: self.data.start,
                end: self.data.end,
            });
        }
        Ok(())
    }

    pub fn strategy_kind(&self) -> Result<StrategyKind, ConfigError> {
        Ok(self.backtest.strategy.parse()?)
    }

    /// Same config with another strategy selected and no parameter overrides.
    pub fn with_strategy(&self, kind: StrategyKind) -> Self {
        let mut config = self.clone();
        if config.backtest.strategy != kind.as_str() {
            config.params.clear();
        }
        config.backtest.strategy = kind.as_str().to_string();
        config
    }

    pub fn engine_config(&self) -> EngineConfig {
        let bt = &self.backtest;
        EngineConfig::new(bt.initial_cash)
            .with_sizer(PercentSizer::new(bt.percent).with_lot(bt.lot))
            .with_execution(ExecutionConfig {
                commission_pct: bt.commission_pct,
                path_policy: bt.path_policy,
            })
            .with_periods_per_year(
                bt.periods_per_year
                    .unwrap_or_else(|| self.data.interval.periods_per_year()),
            )
    }

    pub fn series_key(&self) -> SeriesKey {
        let midnight = |d: NaiveDate| Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN));
        SeriesKey::new(
            self.data.symbol.clone(),
            self.data.interval,
            midnight(self.data.start),
            midnight(self.data.end),
        )
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            offline: self.data.offline,
            synthetic: self.data.synthetic,
            force: self.data.refresh,
        }
    }

    /// Deterministic hash of the whole configuration.
    ///
    /// Two runs with identical configs share a RunId. Plot settings and the
    /// cache location do not affect results and are excluded.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        #[derive(Serialize)]
        struct Identity<'a> {
            backtest: &'a BacktestSection,
            symbol: &'a str,
            interval: Interval,
            start: NaiveDate,
            end: NaiveDate,
            params: &'a BTreeMap<String, f64>,
        }
        let hash = ContentHash::of(&Identity {
            backtest: &self.backtest,
            symbol: &self.data.symbol,
            interval: self.data.interval,
            start: self.data.start,
            end: self.data.end,
            params: &self.params,
        })?;
        Ok(hash.0)
    }
}
