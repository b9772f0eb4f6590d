//! candlelab core — bar series, indicators, strategies and the backtesting engine.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars, orders, fills, positions, trades)
//! - Incremental indicators exposing `value(lookback)`
//! - The closed set of built-in strategies behind one trait
//! - Order book, broker and analytics, threaded through the bar loop
//! - Bar sources (Binance klines, synthetic) and the parquet cache

pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod strategy;
