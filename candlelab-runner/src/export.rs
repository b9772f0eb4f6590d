//! Export — JSON and CSV artifact generation.
//!
//! Provides the export formats for backtest results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape, equity curve and chart data for external tools
//!
//! All persisted JSON includes a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use candlelab_core::domain::{Fill, OrderSide, Trade};
use candlelab_core::engine::EquityPoint;
use thiserror::Error;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported schema version {found} (max supported: {max})")]
    UnsupportedSchema { found: u32, max: u32 },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult, ExportError> {
    let result: BacktestResult = serde_json::from_str(json)?;
    if result.schema_version > SCHEMA_VERSION {
        return Err(ExportError::UnsupportedSchema {
            found: result.schema_version,
            max: SCHEMA_VERSION,
        });
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr.into_inner().map_err(|e| ExportError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Export a trade list as CSV.
///
/// Columns: side, entry_bar, entry_time, entry_price, exit_bar, exit_time,
/// exit_price, size, pnl, commission, net_pnl, outcome, bars_held
pub fn export_trades_csv(trades: &[Trade]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "side",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "size",
        "pnl",
        "commission",
        "net_pnl",
        "outcome",
        "bars_held",
    ])?;

    for t in trades {
        wtr.write_record([
            format!("{:?}", t.side),
            t.entry_bar.to_string(),
            t.entry_time.to_rfc3339(),
            format!("{:.6}", t.entry_price),
            t.exit_bar.to_string(),
            t.exit_time.to_rfc3339(),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.size),
            format!("{:.2}", t.pnl),
            format!("{:.2}", t.commission),
            format!("{:.2}", t.net_pnl),
            format!("{:?}", t.outcome),
            t.bars_held.to_string(),
        ])?;
    }

    finish_csv(wtr)
}

/// Export the bar-by-bar equity curve as CSV.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "timestamp", "close", "cash", "position", "equity"])?;
    for p in equity_curve {
        wtr.write_record([
            p.bar_index.to_string(),
            p.timestamp.to_rfc3339(),
            format!("{:.6}", p.close),
            format!("{:.2}", p.cash),
            format!("{:.6}", p.position_size),
            format!("{:.2}", p.equity),
        ])?;
    }
    finish_csv(wtr)
}

/// Chart data: price, equity and buy/sell markers on one row per bar.
///
/// A marker column holds the fill price when a fill of that side happened
/// on the bar, empty otherwise.
pub fn export_chart_csv(
    equity_curve: &[EquityPoint],
    fills: &[Fill],
) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "close", "equity", "buy", "sell"])?;

    let marker = |bar_index: usize, side: OrderSide| {
        fills
            .iter()
            .find(|f| f.bar_index == bar_index && f.side == side)
            .map(|f| format!("{:.6}", f.price))
            .unwrap_or_default()
    };

    for p in equity_curve {
        wtr.write_record([
            p.timestamp.to_rfc3339(),
            format!("{:.6}", p.close),
            format!("{:.2}", p.equity),
            marker(p.bar_index, OrderSide::Buy),
            marker(p.bar_index, OrderSide::Sell),
        ])?;
    }
    finish_csv(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for a single backtest run.
///
/// Creates `{symbol}_{strategy}_{run id prefix}/` under `output_dir`
/// containing:
/// - `manifest.json` — the full `BacktestResult`
/// - `trades.csv` — trade tape
/// - `equity.csv` — bar-by-bar equity curve
/// - `chart.csv` — price, equity and fill markers (only with `with_chart`)
///
/// Returns the path to the created directory.
pub fn save_artifacts(
    result: &BacktestResult,
    output_dir: &Path,
    with_chart: bool,
) -> Result<PathBuf, ExportError> {
    let dirname = format!(
        "{}_{}_{}",
        result.symbol(),
        result.strategy(),
        &result.run_id[..12.min(result.run_id.len())]
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir).map_err(io_err(&run_dir))?;

    let write = |name: &str, content: String| -> Result<(), ExportError> {
        let path = run_dir.join(name);
        std::fs::write(&path, content).map_err(io_err(&path))
    };

    write("manifest.json", export_json(result)?)?;
    write("trades.csv", export_trades_csv(&result.result.trades)?)?;
    write("equity.csv", export_equity_csv(&result.result.equity_curve)?)?;
    if with_chart {
        write(
            "chart.csv",
            export_chart_csv(&result.result.equity_curve, &result.result.fills)?,
        )?;
    }

    Ok(run_dir)
}

/// Load a previously saved artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult, ExportError> {
    let path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&path).map_err(io_err(&path))?;
    import_json(&json)
}
