//! Engine configuration, run result and the per-bar accounting check.

use super::analytics::{EquityPoint, RunStats};
use super::broker::{Broker, ExecutionConfig};
use super::sizer::PercentSizer;
use crate::domain::{Fill, Order, OrderAuditEntry, Trade};
use crate::strategy::{OrderIntent, StrategyParams};
use serde::{Deserialize, Serialize};

/// Hourly bars: 365 * 24.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 8760.0;

/// Configuration for a single backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_cash: f64,
    pub sizer: PercentSizer,
    pub execution: ExecutionConfig,
    /// Annualization factor for the Sharpe ratio.
    pub periods_per_year: f64,
}

impl EngineConfig {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            sizer: PercentSizer::default(),
            execution: ExecutionConfig::frictionless(),
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }

    pub fn with_sizer(mut self, sizer: PercentSizer) -> Self {
        self.sizer = sizer;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_periods_per_year(mut self, periods_per_year: f64) -> Self {
        self.periods_per_year = periods_per_year;
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(format!("initial cash must be positive, got {}", self.initial_cash));
        }
        if !(self.sizer.percent > 0.0 && self.sizer.percent <= 100.0) {
            return Err(format!(
                "sizer percent must be in (0, 100], got {}",
                self.sizer.percent
            ));
        }
        if !(self.sizer.lot.is_finite() && self.sizer.lot > 0.0) {
            return Err(format!("lot size must be positive, got {}", self.sizer.lot));
        }
        if !(self.execution.commission_pct.is_finite() && self.execution.commission_pct >= 0.0) {
            return Err(format!(
                "commission must be non-negative, got {}",
                self.execution.commission_pct
            ));
        }
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(format!(
                "periods per year must be positive, got {}",
                self.periods_per_year
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(10_000.0)
    }
}

/// An intent the broker refused. The run carries on without it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedIntent {
    pub bar_index: usize,
    pub intent: OrderIntent,
    pub reason: String,
}

/// Result of a complete backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub strategy: String,
    pub params: StrategyParams,
    pub config: EngineConfig,
    pub stats: RunStats,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub fills: Vec<Fill>,
    /// Every order of the run in its final state.
    pub orders: Vec<Order>,
    pub audit_trail: Vec<OrderAuditEntry>,
    pub rejected_intents: Vec<RejectedIntent>,
}

impl RunResult {
    pub fn final_equity(&self) -> f64 {
        self.stats.final_equity
    }
}

/// Equity rebuilt from the fill tape alone: starting cash plus the cash flow
/// of every fill, with the net filled size marked at `mark`.
pub fn replay_equity(initial_cash: f64, fills: &[Fill], mark: f64) -> f64 {
    let (cash, size) = fills.iter().fold((initial_cash, 0.0), |(cash, size), f| {
        let signed = f.side.sign() * f.size;
        (cash - signed * f.price - f.commission, size + signed)
    });
    cash + size * mark
}

/// Equity at `mark`. Debug builds also check it against the fill tape replay.
pub fn verify_equity(broker: &Broker, mark: f64) -> f64 {
    let equity = broker.equity(mark);

    #[cfg(debug_assertions)]
    {
        let replayed = replay_equity(broker.initial_cash(), broker.fills(), mark);
        let turnover: f64 = broker.fills().iter().map(|f| f.price * f.size).sum();
        let tolerance = 1e-9 * (turnover + equity.abs()).max(1.0);
        assert!(
            (equity - replayed).abs() <= tolerance,
            "equity accounting violated: broker={equity}, replayed from {} fills={replayed} \
             (cash={}, position={})",
            broker.fills().len(),
            broker.cash(),
            broker.position().size,
        );
    }

    equity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, OrderId, OrderKind, OrderSide};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::new(1_000.0);
        assert_eq!(config.initial_cash, 1_000.0);
        assert_eq!(config.sizer.percent, 100.0);
        assert_eq!(config.execution.commission_pct, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(EngineConfig::new(0.0).validate().is_err());
        assert!(EngineConfig::new(-1.0).validate().is_err());
        assert!(EngineConfig::new(1_000.0)
            .with_sizer(PercentSizer::new(150.0))
            .validate()
            .is_err());
        assert!(EngineConfig::new(1_000.0)
            .with_sizer(PercentSizer::new(0.0))
            .validate()
            .is_err());
        assert!(EngineConfig::new(1_000.0)
            .with_periods_per_year(0.0)
            .validate()
            .is_err());
    }

    #[test]
    fn verify_equity_flat_broker() {
        let broker = Broker::new(1_000.0, PercentSizer::default(), ExecutionConfig::default());
        assert_eq!(verify_equity(&broker, 123.0), 1_000.0);
    }

    fn fill(side: OrderSide, price: f64, size: f64, commission: f64) -> Fill {
        Fill {
            order_id: OrderId(1),
            bar_index: 0,
            timestamp: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            side,
            price,
            size,
            commission,
        }
    }

    #[test]
    fn replay_tracks_cash_flows_and_net_size() {
        let fills = [
            fill(OrderSide::Buy, 100.0, 10.0, 1.0),
            fill(OrderSide::Sell, 110.0, 4.0, 0.44),
        ];
        // cash: 1000 - 1000 - 1 + 440 - 0.44, position 6 at 120
        let replayed = replay_equity(1_000.0, &fills, 120.0);
        assert!((replayed - (438.56 + 720.0)).abs() < 1e-9);
        // Missing fills show up.
        assert!((replay_equity(1_000.0, &fills[..1], 120.0) - replayed).abs() > 1.0);
    }

    #[test]
    fn verify_equity_agrees_with_replay_after_trading() {
        let mut broker = Broker::new(
            10_000.0,
            PercentSizer::default(),
            ExecutionConfig {
                commission_pct: 0.1,
                ..ExecutionConfig::default()
            },
        );
        let t0 = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let b0 = Bar::new(t0, 100.0, 101.0, 99.0, 100.0, 1.0);
        let b1 = Bar::new(t0 + Duration::hours(1), 102.0, 104.0, 101.0, 103.0, 1.0);
        broker
            .submit(
                &OrderIntent::Single {
                    side: OrderSide::Buy,
                    kind: OrderKind::Market,
                    price: None,
                    size: None,
                },
                &b0,
                0,
            )
            .unwrap();
        broker.resolve(&b1, 1).unwrap();
        assert!(!broker.position().is_flat());

        let equity = verify_equity(&broker, b1.close);
        let replayed = replay_equity(broker.initial_cash(), broker.fills(), b1.close);
        assert!((equity - replayed).abs() < 1e-6);
    }
}
