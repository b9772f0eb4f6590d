//! Historical bar sources and the on-disk cache

pub mod binance;
pub mod cache;
pub mod provider;
pub mod synthetic;

pub use binance::BinanceSource;
pub use cache::{CacheMeta, ParquetCache};
pub use provider::{BarSource, DataError, DataSource, Interval, SeriesKey};
pub use synthetic::SyntheticSource;
