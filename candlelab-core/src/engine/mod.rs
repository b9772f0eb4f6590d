//! Backtesting engine — bar-by-bar event loop and supporting infrastructure.
//!
//! The loop walks a `BarSeries` once. On every bar the broker resolves live
//! orders, indicators advance, the strategy decides, new intents enter the
//! order book and an equity snapshot is recorded. Statistics are computed
//! when the series is exhausted.

pub mod analytics;
pub mod broker;
pub mod loop_runner;
pub mod order_book;
pub mod path_policy;
pub mod sizer;
pub mod state;
pub mod trigger;

pub use analytics::{AnalyticsCollector, EquityPoint, RunStats};
pub use broker::{Broker, BrokerError, ExecutionConfig};
pub use loop_runner::{run_backtest, Engine, EngineError};
pub use order_book::{OrderBook, OrderBookError};
pub use path_policy::PathPolicy;
pub use sizer::PercentSizer;
pub use state::{
    replay_equity, verify_equity, EngineConfig, RejectedIntent, RunResult,
    DEFAULT_PERIODS_PER_YEAR,
};
