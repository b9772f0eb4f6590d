//! Domain types for candlelab

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod position;
pub mod series;
pub mod trade;

pub use bar::Bar;
pub use fill::Fill;
pub use ids::{IdGen, OrderId};
pub use order::{
    validate_order, Order, OrderAuditEntry, OrderError, OrderEvent, OrderKind, OrderRole,
    OrderSide, OrderStatus,
};
pub use position::{ClosedLot, Position, PositionSide};
pub use series::{BarSeries, Ohlcv, SeriesError};
pub use trade::{Trade, TradeOutcome};
