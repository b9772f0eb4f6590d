//! Plain-text run summaries for the terminal.

use candlelab_core::engine::RunStats;
use candlelab_core::strategy::StrategyKind;

use crate::runner::{BacktestResult, RunError};

/// Summary block of one run.
///
/// Example:
/// ```text
/// Final Portfolio Value: 1234.56
///
/// --- Strategy Analysis ---
/// Winrate: 45.00%
/// Sharpe Ratio: 0.8123
/// Max Drawdown: 23.10%
/// Total Return: 23.46%
/// ```
pub fn summary_lines(result: &BacktestResult) -> Vec<String> {
    let stats = &result.result.stats;
    let mut lines = vec![
        format!("Final Portfolio Value: {:.2}", stats.final_equity),
        String::new(),
        "--- Strategy Analysis ---".to_string(),
    ];
    lines.extend(stat_lines(stats));
    lines.push(format!(
        "Trades: {} (won {}, lost {}, breakeven {})",
        stats.trade_count, stats.won, stats.lost, stats.breakeven
    ));
    if result.is_synthetic() {
        lines.push("Data: synthetic".to_string());
    }
    lines
}

fn stat_lines(stats: &RunStats) -> Vec<String> {
    vec![
        format!("Winrate: {:.2}%", stats.win_rate * 100.0),
        format!("Sharpe Ratio: {}", format_sharpe(stats.sharpe)),
        format!("Max Drawdown: {:.2}%", stats.max_drawdown_pct),
        format!("Total Return: {:.2}%", stats.total_return_pct),
    ]
}

fn format_sharpe(sharpe: Option<f64>) -> String {
    sharpe.map_or_else(|| "None".to_string(), |s| format!("{s:.4}"))
}

/// One row per strategy, failed runs included.
pub fn comparison_table(results: &[(StrategyKind, Result<BacktestResult, RunError>)]) -> String {
    let mut out = format!(
        "{:<20} {:>12} {:>9} {:>9} {:>9} {:>10} {:>7}\n",
        "Strategy", "Final", "Return%", "MaxDD%", "Winrate%", "Sharpe", "Trades"
    );
    out.push_str(&"-".repeat(82));
    out.push('\n');
    for (kind, result) in results {
        match result {
            Ok(r) => {
                let s = &r.result.stats;
                out.push_str(&format!(
                    "{:<20} {:>12.2} {:>9.2} {:>9.2} {:>9.2} {:>10} {:>7}\n",
                    kind.as_str(),
                    s.final_equity,
                    s.total_return_pct,
                    s.max_drawdown_pct,
                    s.win_rate * 100.0,
                    format_sharpe(s.sharpe),
                    s.trade_count
                ));
            }
            Err(e) => out.push_str(&format!("{:<20} failed: {e}\n", kind.as_str())),
        }
    }
    out
}
