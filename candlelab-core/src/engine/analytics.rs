//! Analytics — equity curve, trade log and end-of-run statistics.
//!
//! The collector only appends during the run. Statistics are computed by the
//! pure functions below, which take an equity curve and/or trade list and
//! return a scalar.

use crate::domain::{Trade, TradeOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One snapshot per bar, taken after the strategy has acted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub cash: f64,
    pub position_size: f64,
    pub equity: f64,
}

/// Summary statistics of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub initial_cash: f64,
    pub final_equity: f64,
    /// Percent, e.g. 12.5 for +12.5%.
    pub total_return_pct: f64,
    /// Percent of peak, in [0, 100].
    pub max_drawdown_pct: f64,
    /// Annualized; `None` with fewer than two returns or zero variance.
    pub sharpe: Option<f64>,
    /// won / (won + lost), in [0, 1].
    pub win_rate: f64,
    pub trade_count: usize,
    pub won: usize,
    pub lost: usize,
    pub breakeven: usize,
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// `None` when there are no losing trades.
    pub profit_factor: Option<f64>,
    pub avg_trade_pnl: f64,
    pub total_commission: f64,
    pub bar_count: usize,
}

#[derive(Debug, Clone)]
pub struct AnalyticsCollector {
    initial_cash: f64,
    periods_per_year: f64,
    equity: Vec<EquityPoint>,
    trades: Vec<Trade>,
}

impl AnalyticsCollector {
    pub fn new(initial_cash: f64, periods_per_year: f64) -> Self {
        Self {
            initial_cash,
            periods_per_year,
            equity: Vec::new(),
            trades: Vec::new(),
        }
    }

    pub fn record_equity(&mut self, point: EquityPoint) {
        debug_assert!(
            self.equity
                .last()
                .map_or(true, |p| p.timestamp < point.timestamp),
            "equity points must be strictly increasing in time"
        );
        self.equity.push(point);
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn finalize(&self) -> RunStats {
        let values: Vec<f64> = self.equity.iter().map(|p| p.equity).collect();
        let final_equity = values.last().copied().unwrap_or(self.initial_cash);
        let returns = period_returns(self.initial_cash, &values);

        let (won, lost, breakeven) = outcome_counts(&self.trades);
        let gross_profit: f64 = self
            .trades
            .iter()
            .filter(|t| t.net_pnl > 0.0)
            .map(|t| t.net_pnl)
            .sum();
        let gross_loss: f64 = self
            .trades
            .iter()
            .filter(|t| t.net_pnl < 0.0)
            .map(|t| t.net_pnl.abs())
            .sum();
        let net: f64 = self.trades.iter().map(|t| t.net_pnl).sum();

        RunStats {
            initial_cash: self.initial_cash,
            final_equity,
            total_return_pct: total_return_pct(self.initial_cash, final_equity),
            max_drawdown_pct: max_drawdown_pct(self.initial_cash, &values),
            sharpe: sharpe_ratio(&returns, self.periods_per_year),
            win_rate: win_rate(&self.trades),
            trade_count: self.trades.len(),
            won,
            lost,
            breakeven,
            gross_profit,
            gross_loss,
            profit_factor: (gross_loss > 0.0).then(|| gross_profit / gross_loss),
            avg_trade_pnl: if self.trades.is_empty() {
                0.0
            } else {
                net / self.trades.len() as f64
            },
            total_commission: self.trades.iter().map(|t| t.commission).sum(),
            bar_count: self.equity.len(),
        }
    }

    pub fn into_parts(self) -> (Vec<EquityPoint>, Vec<Trade>) {
        (self.equity, self.trades)
    }
}

// ─── Metric functions ───────────────────────────────────────────────

/// (final / initial − 1) · 100. Zero for a non-positive initial value.
pub fn total_return_pct(initial: f64, final_equity: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_equity / initial - 1.0) * 100.0
}

/// Largest peak-to-trough decline as a percent of the peak, in [0, 100].
///
/// The starting value counts as the first peak.
pub fn max_drawdown_pct(initial: f64, equity: &[f64]) -> f64 {
    let mut peak = initial;
    let mut max_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (peak - value) / peak * 100.0;
            max_dd = max_dd.max(dd);
        }
    }
    max_dd.clamp(0.0, 100.0)
}

/// Simple returns between consecutive values, starting from `initial`.
pub fn period_returns(initial: f64, equity: &[f64]) -> Vec<f64> {
    let mut prev = initial;
    let mut out = Vec::with_capacity(equity.len());
    for &value in equity {
        out.push(if prev > 0.0 { value / prev - 1.0 } else { 0.0 });
        prev = value;
    }
    out
}

/// mean / sample stdev · sqrt(periods_per_year).
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let mean = mean(returns);
    let std = std_dev(returns);
    if std < 1e-15 || !std.is_finite() {
        return None;
    }
    Some(mean / std * periods_per_year.sqrt())
}

/// won / (won + lost); breakeven trades are excluded, 0 when none count.
pub fn win_rate(trades: &[Trade]) -> f64 {
    let (won, lost, _) = outcome_counts(trades);
    if won + lost == 0 {
        return 0.0;
    }
    won as f64 / (won + lost) as f64
}

fn outcome_counts(trades: &[Trade]) -> (usize, usize, usize) {
    trades
        .iter()
        .fold((0, 0, 0), |(w, l, b), t| match t.outcome {
            TradeOutcome::Won => (w + 1, l, b),
            TradeOutcome::Lost => (w, l + 1, b),
            TradeOutcome::Breakeven => (w, l, b + 1),
        })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PositionSide;
    use chrono::{Duration, TimeZone};

    fn trade(entry: f64, exit: f64) -> Trade {
        let t0 = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        Trade::new(
            PositionSide::Long,
            0,
            t0,
            entry,
            5,
            t0 + Duration::hours(5),
            exit,
            1.0,
            0.0,
        )
    }

    fn point(i: usize, equity: f64) -> EquityPoint {
        EquityPoint {
            bar_index: i,
            timestamp: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
                + Duration::hours(i as i64),
            close: 100.0,
            cash: equity,
            position_size: 0.0,
            equity,
        }
    }

    #[test]
    fn total_return_percent() {
        assert!((total_return_pct(1_000.0, 1_250.0) - 25.0).abs() < 1e-12);
        assert!((total_return_pct(1_000.0, 800.0) + 20.0).abs() < 1e-12);
        assert_eq!(total_return_pct(0.0, 800.0), 0.0);
    }

    #[test]
    fn drawdown_known_curve() {
        let dd = max_drawdown_pct(100.0, &[110.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((dd - 25.0).abs() < 1e-12);
    }

    #[test]
    fn drawdown_zero_on_rising_curve() {
        assert_eq!(max_drawdown_pct(100.0, &[100.0, 101.0, 105.0, 105.0]), 0.0);
        assert_eq!(max_drawdown_pct(100.0, &[]), 0.0);
    }

    #[test]
    fn drawdown_is_capped_at_total_loss() {
        assert_eq!(max_drawdown_pct(100.0, &[50.0, 0.0]), 100.0);
    }

    #[test]
    fn sharpe_needs_variance() {
        assert_eq!(sharpe_ratio(&[0.01], 252.0), None);
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], 252.0), None);
        assert_eq!(sharpe_ratio(&[0.0, 0.0], 252.0), None);
    }

    #[test]
    fn sharpe_known_returns() {
        let returns = [0.01, -0.01, 0.02, 0.0];
        // mean 0.005, sample variance 0.0005 / 3
        let expected = 0.005 / (0.0005_f64 / 3.0).sqrt() * 252.0_f64.sqrt();
        let got = sharpe_ratio(&returns, 252.0).unwrap();
        assert!((got - expected).abs() < 1e-9);
    }

    #[test]
    fn win_rate_ignores_breakeven() {
        let trades = vec![trade(100.0, 110.0), trade(100.0, 90.0), trade(100.0, 100.0)];
        assert!((win_rate(&trades) - 0.5).abs() < 1e-12);
        assert_eq!(win_rate(&[]), 0.0);
        assert_eq!(win_rate(&[trade(100.0, 100.0)]), 0.0);
    }

    #[test]
    fn finalize_with_no_trades() {
        let mut c = AnalyticsCollector::new(1_000.0, 8760.0);
        for i in 0..10 {
            c.record_equity(point(i, 1_000.0));
        }
        let stats = c.finalize();
        assert_eq!(stats.trade_count, 0);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.sharpe, None);
        assert_eq!(stats.max_drawdown_pct, 0.0);
        assert_eq!(stats.total_return_pct, 0.0);
        assert_eq!(stats.final_equity, 1_000.0);
        assert_eq!(stats.profit_factor, None);
        assert_eq!(stats.bar_count, 10);
    }

    #[test]
    fn finalize_counts_trades() {
        let mut c = AnalyticsCollector::new(1_000.0, 8760.0);
        c.record_equity(point(0, 1_000.0));
        c.record_equity(point(1, 1_010.0));
        c.record_equity(point(2, 1_005.0));
        c.record_trade(trade(100.0, 110.0));
        c.record_trade(trade(100.0, 95.0));

        let stats = c.finalize();
        assert_eq!(stats.trade_count, 2);
        assert_eq!((stats.won, stats.lost, stats.breakeven), (1, 1, 0));
        assert!((stats.gross_profit - 10.0).abs() < 1e-12);
        assert!((stats.gross_loss - 5.0).abs() < 1e-12);
        assert_eq!(stats.profit_factor, Some(2.0));
        assert!((stats.avg_trade_pnl - 2.5).abs() < 1e-12);
        assert!((stats.total_return_pct - 0.5).abs() < 1e-9);
        assert!(stats.sharpe.is_some());
    }
}
