//! candlelab CLI — run, compare and cache commands.
//!
//! Commands:
//! - `run` — backtest one strategy from a TOML config file and/or flags
//! - `compare` — run every built-in strategy over the same series in parallel
//! - `cache status` — list cached series with bar counts and sizes
//!
//! Exit codes: 0 on success, 2 on invalid configuration or selector,
//! 3 when data cannot be loaded, 1 on any other failure.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use candlelab_core::data::{BarSource, BinanceSource, Interval, ParquetCache};
use candlelab_core::engine::PathPolicy;
use candlelab_runner::{
    compare_all, comparison_table, run_single_backtest, save_artifacts, summary_lines,
    BacktestConfig, ConfigError, LoadError, RunError,
};

#[derive(Parser)]
#[command(
    name = "candlelab",
    about = "candlelab CLI — event-driven crypto backtesting"
)]
struct Cli {
    /// Log filter used when CANDLELAB_LOG is unset (e.g. info, debug, candlelab_core=trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest one strategy.
    Run {
        /// Strategy: MaCross, TripleSupertrend, CrossoverStochRSI, TripleEMaStrategy.
        #[arg(long)]
        strategy: Option<String>,

        /// Disable plotting.
        #[arg(long, default_value_t = false)]
        no_plot: bool,

        /// Save the chart data next to the other artifacts.
        #[arg(long, default_value_t = false)]
        save_plot: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Run every built-in strategy over the same series.
    Compare {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Flags shared by `run` and `compare`. Each one overrides the config file.
#[derive(Args)]
struct CommonArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting cash.
    #[arg(long)]
    cash: Option<f64>,

    /// Percent of cash committed per entry, in (0, 100].
    #[arg(long)]
    percent: Option<f64>,

    /// Commission as a percent of fill notional.
    #[arg(long)]
    commission: Option<f64>,

    /// Intrabar tie-break: worst_case, best_case or deterministic.
    #[arg(long)]
    path_policy: Option<String>,

    /// Trading pair (e.g. BTCUSDT).
    #[arg(long)]
    symbol: Option<String>,

    /// Bar interval (1m, 5m, 15m, 30m, 1h, 4h, 1d).
    #[arg(long)]
    interval: Option<String>,

    /// Start date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD), exclusive.
    #[arg(long)]
    end: Option<String>,

    /// Offline mode: no network access.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Use synthetic data as fallback.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Re-download even if the series is cached.
    #[arg(long, default_value_t = false)]
    refresh: bool,

    /// Cache directory. Defaults to ./data.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Output directory for artifacts. Defaults to ./results.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached series, bar counts and sizes.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    let outcome = match cli.command {
        Commands::Run {
            strategy,
            no_plot,
            save_plot,
            common,
        } => run_cmd(strategy, no_plot, save_plot, &common),
        Commands::Compare { common } => compare_cmd(&common),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
        },
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let filter = std::env::var("CANDLELAB_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| anyhow!("invalid log filter: {err}"))?;

    // Logs share stderr in both formats; stdout carries only the report.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let installed = match log_format.trim().to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "text" => builder.try_init(),
        other => return Err(anyhow!("unknown log format '{other}' (expected text or json)")),
    };
    installed.map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}

fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.is::<ConfigError>() {
            return 2;
        }
        if cause.is::<LoadError>() {
            return 3;
        }
        if let Some(run) = cause.downcast_ref::<RunError>() {
            return match run {
                RunError::Config(_) | RunError::Strategy(_) => 2,
                RunError::Data(_) => 3,
                _ => 1,
            };
        }
    }
    1
}

/// Config file (or defaults) with command-line overrides applied.
fn build_config(common: &CommonArgs) -> Result<BacktestConfig> {
    let mut config = match &common.config {
        Some(path) => BacktestConfig::from_file(path)?,
        None => BacktestConfig::default(),
    };

    if let Some(cash) = common.cash {
        config.backtest.initial_cash = cash;
    }
    if let Some(percent) = common.percent {
        config.backtest.percent = percent;
    }
    if let Some(commission) = common.commission {
        config.backtest.commission_pct = commission;
    }
    if let Some(policy) = &common.path_policy {
        config.backtest.path_policy = policy
            .parse::<PathPolicy>()
            .map_err(|e| anyhow!(e))
            .context("invalid --path-policy")?;
    }
    if let Some(symbol) = &common.symbol {
        config.data.symbol = symbol.to_uppercase();
    }
    if let Some(interval) = &common.interval {
        config.data.interval = interval.parse::<Interval>()?;
    }
    if let Some(start) = &common.start {
        config.data.start = parse_date(start).context("invalid --start")?;
    }
    if let Some(end) = &common.end {
        config.data.end = parse_date(end).context("invalid --end")?;
    }
    config.data.offline |= common.offline;
    config.data.synthetic |= common.synthetic;
    config.data.refresh |= common.refresh;
    if let Some(dir) = &common.cache_dir {
        config.data.cache_dir = dir.clone();
    }
    if let Some(dir) = &common.output_dir {
        config.plot.output = dir.clone();
    }
    Ok(config)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
}

/// Binance source unless running offline.
fn bar_source(config: &BacktestConfig) -> Result<Option<Box<dyn BarSource>>> {
    if config.data.offline {
        return Ok(None);
    }
    Ok(Some(Box::new(BinanceSource::new()?)))
}

fn run_cmd(
    strategy: Option<String>,
    no_plot: bool,
    save_plot: bool,
    common: &CommonArgs,
) -> Result<()> {
    let mut config = build_config(common)?;
    if let Some(strategy) = strategy {
        config.backtest.strategy = strategy;
    }
    if no_plot {
        config.plot.enabled = false;
    }
    if save_plot {
        config.plot.save = true;
    }

    let cache = ParquetCache::new(&config.data.cache_dir);
    let source = bar_source(&config)?;
    let result = run_single_backtest(&config, &cache, source.as_deref())?;

    println!("Starting Portfolio Value: {:.2}", config.backtest.initial_cash);
    for line in summary_lines(&result) {
        println!("{line}");
    }

    let with_chart = config.plot.enabled && config.plot.save;
    let run_dir = save_artifacts(&result, &config.plot.output, with_chart)?;
    info!(dir = %run_dir.display(), run_id = %result.run_id, "artifacts saved");
    println!("Artifacts saved to: {}", run_dir.display());
    if with_chart {
        println!("Plot saved to {}", run_dir.join("chart.csv").display());
    } else if config.plot.enabled {
        println!("Pass --save-plot to write chart data.");
    }
    if result.is_synthetic() {
        warn!("results are based on synthetic data");
    }
    Ok(())
}

fn compare_cmd(common: &CommonArgs) -> Result<()> {
    let config = build_config(common)?;
    let cache = ParquetCache::new(&config.data.cache_dir);
    let source = bar_source(&config)?;

    let results = compare_all(&config, &cache, source.as_deref())?;
    println!();
    print!("{}", comparison_table(&results));

    if results.iter().any(|(_, r)| r.is_err()) {
        return Err(anyhow!("one or more strategies failed"));
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = ParquetCache::new(cache_dir);
    let entries = cache.entries();
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let mut total_size = 0u64;
    let rows: Vec<_> = entries
        .iter()
        .map(|meta| {
            let size = std::fs::metadata(cache.entry_path(&meta.key))
                .map(|m| m.len())
                .unwrap_or(0);
            total_size += size;
            (meta, size)
        })
        .collect();

    println!("Cache: {}", cache_dir.display());
    println!("Series: {}", rows.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!(
        "{:<10} {:<4} {:<35} {:>8} {:>10} {:<10}",
        "Symbol", "Int", "Range", "Bars", "Size", "Source"
    );
    println!("{}", "-".repeat(82));
    for (meta, size) in rows {
        println!(
            "{:<10} {:<4} {:<35} {:>8} {:>10} {:<10}",
            meta.key.symbol,
            meta.key.interval.as_str(),
            format!(
                "{} to {}",
                meta.first_bar.format("%Y-%m-%d %H:%M"),
                meta.last_bar.format("%Y-%m-%d %H:%M")
            ),
            meta.bar_count,
            format_size(size),
            meta.source
        );
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
