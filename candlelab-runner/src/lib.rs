//! candlelab runner — backtest orchestration on top of `candlelab-core`.
//!
//! This crate provides:
//! - TOML configuration with validation and a deterministic run id
//! - Data loading with cache/fetch/synthetic fallback
//! - Single runs and parallel multi-strategy comparison
//! - JSON and CSV export, terminal summaries

pub mod config;
pub mod data_loader;
pub mod export;
pub mod report;
pub mod runner;

pub use config::{BacktestConfig, ConfigError, RunId};
pub use data_loader::{load_bars, LoadError, LoadOptions, LoadedData};
pub use export::{save_artifacts, ExportError};
pub use report::{comparison_table, summary_lines};
pub use runner::{
    compare_all, run_many, run_on_series, run_single_backtest, BacktestResult, RunError,
};
