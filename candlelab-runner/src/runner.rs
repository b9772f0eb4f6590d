//! Backtest runner — wires together configuration, data and the engine.
//!
//! Entry points:
//! - `run_single_backtest()`: loads data, then runs the configured strategy. Used by CLI.
//! - `run_on_series()`: runs one strategy on pre-loaded bars, no I/O.
//! - `run_many()`: runs several strategies over the same bars in parallel.

use candlelab_core::data::{BarSource, DataSource, ParquetCache};
use candlelab_core::domain::BarSeries;
use candlelab_core::engine::{run_backtest, EngineError, RunResult};
use candlelab_core::strategy::{StrategyError, StrategyKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{load_bars, LoadError, LoadedData};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: BacktestConfig,
    pub data_source: DataSource,
    pub dataset_hash: String,
    /// BLAKE3 of the equity curve and trades.
    pub fingerprint: String,
    pub result: RunResult,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn symbol(&self) -> &str {
        &self.config.data.symbol
    }

    pub fn strategy(&self) -> &str {
        &self.result.strategy
    }

    pub fn is_synthetic(&self) -> bool {
        self.data_source == DataSource::Synthetic
    }
}

/// Run the configured strategy on pre-loaded bars — no I/O.
pub fn run_on_series(config: &BacktestConfig, series: BarSeries) -> Result<RunResult, RunError> {
    let strategy = config.strategy_kind()?.build(&config.params)?;
    Ok(run_backtest(series, strategy, config.engine_config())?)
}

/// Run a single backtest from a BacktestConfig, loading data first.
///
/// The config is validated before any data is touched.
pub fn run_single_backtest(
    config: &BacktestConfig,
    cache: &ParquetCache,
    source: Option<&dyn BarSource>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_bars(&config.series_key(), cache, source, &config.load_options())?;
    backtest_loaded(config, &loaded)
}

/// Run one config against already-loaded data and attach provenance.
pub fn backtest_loaded(
    config: &BacktestConfig,
    loaded: &LoadedData,
) -> Result<BacktestResult, RunError> {
    let result = run_on_series(config, loaded.series.clone())?;
    let fingerprint = result.fingerprint()?;
    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id()?,
        config: config.clone(),
        data_source: loaded.source,
        dataset_hash: loaded.dataset_hash.clone(),
        fingerprint: fingerprint.0,
        result,
    })
}

/// Run each strategy in `kinds` over the same data, in parallel.
///
/// The base config's parameter overrides apply only to its own strategy;
/// every other strategy runs with its defaults. Results come back in the
/// order of `kinds`.
pub fn run_many(
    base: &BacktestConfig,
    kinds: &[StrategyKind],
    loaded: &LoadedData,
) -> Vec<(StrategyKind, Result<BacktestResult, RunError>)> {
    info!(
        strategies = kinds.len(),
        bars = loaded.series.len(),
        "running strategies in parallel"
    );
    kinds
        .par_iter()
        .map(|&kind| {
            let config = base.with_strategy(kind);
            (kind, backtest_loaded(&config, loaded))
        })
        .collect()
}

/// Load once, then run every built-in strategy.
pub fn compare_all(
    base: &BacktestConfig,
    cache: &ParquetCache,
    source: Option<&dyn BarSource>,
) -> Result<Vec<(StrategyKind, Result<BacktestResult, RunError>)>, RunError> {
    base.validate()?;
    let loaded = load_bars(&base.series_key(), cache, source, &base.load_options())?;
    Ok(run_many(base, &StrategyKind::ALL, &loaded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candlelab_core::data::SyntheticSource;
    use chrono::NaiveDate;

    fn synthetic_config() -> BacktestConfig {
        let mut config = BacktestConfig::default();
        config.data.start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        config.data.end = NaiveDate::from_ymd_opt(2021, 4, 1).unwrap();
        config.data.offline = true;
        config.data.synthetic = true;
        config
    }

    fn loaded(config: &BacktestConfig) -> LoadedData {
        let bars = SyntheticSource::default().generate(
            &config.data.symbol,
            config.series_key().start,
            config.series_key().end,
            config.data.interval.duration(),
        );
        LoadedData {
            dataset_hash: crate::data_loader::compute_dataset_hash(&bars),
            series: BarSeries::new(bars).unwrap(),
            source: DataSource::Synthetic,
        }
    }

    #[test]
    fn invalid_config_fails_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let mut config = synthetic_config();
        config.backtest.strategy = "Nope".into();

        let err = run_single_backtest(&config, &cache, None).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::Strategy(_))));
    }

    #[test]
    fn synthetic_run_carries_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let config = synthetic_config();

        let result = run_single_backtest(&config, &cache, None).unwrap();
        assert!(result.is_synthetic());
        assert_eq!(result.symbol(), "BTCUSDT");
        assert_eq!(result.strategy(), "MaCross");
        assert_eq!(result.run_id, config.run_id().unwrap());
        assert_eq!(result.fingerprint.len(), 64);
        assert_eq!(result.result.equity_curve.len(), 90 * 24);
    }

    #[test]
    fn run_many_preserves_order_and_is_deterministic() {
        let config = synthetic_config();
        let data = loaded(&config);

        let a = run_many(&config, &StrategyKind::ALL, &data);
        let b = run_many(&config, &StrategyKind::ALL, &data);
        assert_eq!(a.len(), 4);
        for ((ka, ra), (kb, rb)) in a.iter().zip(&b) {
            assert_eq!(ka, kb);
            let (ra, rb) = (ra.as_ref().unwrap(), rb.as_ref().unwrap());
            assert_eq!(ra.strategy(), ka.as_str());
            assert_eq!(ra.fingerprint, rb.fingerprint);
        }
    }

    #[test]
    fn overrides_apply_only_to_the_configured_strategy() {
        let mut config = synthetic_config();
        config.params.insert("fast_length".into(), 10.0);
        let data = loaded(&config);

        let results = run_many(&config, &StrategyKind::ALL, &data);
        for (kind, result) in results {
            let result = result.unwrap();
            if kind == StrategyKind::MaCross {
                assert_eq!(result.result.params.get("fast_length"), Some(10.0));
            } else {
                assert!(result.config.params.is_empty());
            }
        }
    }
}
