//! Bar-by-bar event loop.
//!
//! Per bar:
//! 1. Broker resolves live orders against the new bar
//! 2. Indicators advance with the bar
//! 3. Order events from step 1 are delivered to the strategy
//! 4. Strategy decides; its intents are sized, validated and registered
//! 5. Equity snapshot
//!
//! Orders registered in step 4 are first matched in step 1 of the next bar.

use super::analytics::{AnalyticsCollector, EquityPoint};
use super::broker::{Broker, BrokerError};
use super::order_book::OrderBookError;
use super::state::{verify_equity, EngineConfig, RejectedIntent, RunResult};
use crate::domain::BarSeries;
use crate::indicators::{IndicatorError, IndicatorSet};
use crate::strategy::{OrderPort, Strategy, StrategyContext};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("strategy {strategy} failed on bar {bar_index}: {source}")]
    Strategy {
        strategy: String,
        bar_index: usize,
        #[source]
        source: IndicatorError,
    },

    #[error("order book inconsistency: {0}")]
    OrderBook(#[from] OrderBookError),
}

/// Runs one strategy over one series. Holds no state between runs.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(
        &self,
        mut series: BarSeries,
        mut strategy: Box<dyn Strategy>,
    ) -> Result<RunResult, EngineError> {
        let config = self.config;
        let mut indicators = IndicatorSet::from_indicators(strategy.indicators());
        let mut broker = Broker::new(config.initial_cash, config.sizer, config.execution);
        let mut analytics = AnalyticsCollector::new(config.initial_cash, config.periods_per_year);
        let mut rejected = Vec::new();

        info!(
            strategy = strategy.name(),
            bars = series.len(),
            initial_cash = config.initial_cash,
            indicators = indicators.len(),
            "backtest started"
        );

        let mut bar_index = 0;
        while let Some(bar) = series.advance().copied() {
            broker.resolve(&bar, bar_index)?;
            for trade in broker.take_closed_trades() {
                analytics.record_trade(trade.clone());
            }

            indicators.update(&bar);

            for event in broker.take_events() {
                strategy.on_order(&event);
            }

            let live_orders = broker.live_orders();
            let mut port = OrderPort::new();
            let ctx = StrategyContext {
                bar: &bar,
                bar_index,
                series: &series,
                indicators: &indicators,
                position: broker.position(),
                cash: broker.cash(),
                live_orders: &live_orders,
            };
            strategy
                .on_bar(&ctx, &mut port)
                .map_err(|source| EngineError::Strategy {
                    strategy: strategy.name().to_string(),
                    bar_index,
                    source,
                })?;

            for intent in port.drain() {
                match broker.submit(&intent, &bar, bar_index) {
                    Ok(_) => {}
                    Err(BrokerError::InvalidOrder(e)) => {
                        warn!(bar = bar_index, error = %e, "intent dropped");
                        rejected.push(RejectedIntent {
                            bar_index,
                            intent,
                            reason: e.to_string(),
                        });
                    }
                    Err(BrokerError::OrderBook(e)) => {
                        warn!(bar = bar_index, error = %e, "intent dropped");
                        rejected.push(RejectedIntent {
                            bar_index,
                            intent,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            let equity = verify_equity(&broker, bar.close);
            analytics.record_equity(EquityPoint {
                bar_index,
                timestamp: bar.timestamp,
                close: bar.close,
                cash: broker.cash(),
                position_size: broker.position().size,
                equity,
            });
            bar_index += 1;
        }

        // Events from the last bar's intents have no later bar to arrive on.
        for event in broker.take_events() {
            strategy.on_order(&event);
        }
        if !broker.position().is_flat() {
            debug!(size = broker.position().size, "position still open at end of series");
        }

        let stats = analytics.finalize();
        info!(
            strategy = strategy.name(),
            final_equity = stats.final_equity,
            trades = stats.trade_count,
            total_return_pct = stats.total_return_pct,
            max_drawdown_pct = stats.max_drawdown_pct,
            "backtest finished"
        );

        let (equity_curve, trades) = analytics.into_parts();
        Ok(RunResult {
            strategy: strategy.name().to_string(),
            params: strategy.params().clone(),
            config,
            stats,
            equity_curve,
            trades,
            fills: broker.fills().to_vec(),
            orders: broker.book().orders().cloned().collect(),
            audit_trail: broker.book().audit_trail().to_vec(),
            rejected_intents: rejected,
        })
    }
}

/// Convenience wrapper: validate `config` and run once.
pub fn run_backtest(
    series: BarSeries,
    strategy: Box<dyn Strategy>,
    config: EngineConfig,
) -> Result<RunResult, EngineError> {
    Engine::new(config)?.run(series, strategy)
}
