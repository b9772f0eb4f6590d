//! Strategies — per-bar decision units.
//!
//! A strategy declares the indicators it reads, then receives a read-only
//! `StrategyContext` once per bar and expresses decisions as intents on the
//! `OrderPort`. It never touches cash, position or the order book directly.

pub mod kind;
pub mod ma_cross;
pub mod params;
pub mod port;
pub mod stoch_rsi_cross;
pub mod triple_ema;
pub mod triple_supertrend;

pub use kind::{StrategyError, StrategyKind};
pub use ma_cross::MaCross;
pub use params::StrategyParams;
pub use port::{BracketIntent, OrderIntent, OrderPort};
pub use stoch_rsi_cross::CrossoverStochRsi;
pub use triple_ema::TripleEma;
pub use triple_supertrend::TripleSupertrend;

use crate::domain::{Bar, BarSeries, Order, OrderEvent, Position};
use crate::indicators::{Indicator, IndicatorError, IndicatorSet};

pub trait Strategy: Send {
    /// Selector name (e.g. "MaCross").
    fn name(&self) -> &str;

    /// Resolved parameters, defaults included.
    fn params(&self) -> &StrategyParams;

    /// Fresh indicator instances the engine must advance for this strategy.
    fn indicators(&self) -> Vec<Box<dyn Indicator>>;

    /// Called once per bar after indicators have advanced.
    ///
    /// An `InsufficientHistory` error that escapes here aborts the run.
    fn on_bar(
        &mut self,
        ctx: &StrategyContext<'_>,
        port: &mut OrderPort,
    ) -> Result<(), IndicatorError>;

    /// Order lifecycle notification (fills, cancellations, rejections).
    fn on_order(&mut self, _event: &OrderEvent) {}
}

/// Read-only view handed to `Strategy::on_bar`.
pub struct StrategyContext<'a> {
    pub bar: &'a Bar,
    pub bar_index: usize,
    pub series: &'a BarSeries,
    pub indicators: &'a IndicatorSet,
    pub position: &'a Position,
    pub cash: f64,
    pub live_orders: &'a [Order],
}

impl StrategyContext<'_> {
    pub fn value(&self, name: &str, lookback: usize) -> Result<f64, IndicatorError> {
        self.indicators.value(name, lookback)
    }

    /// Whether every named indicator has values for lookbacks `0..=lookback`.
    pub fn has_history(&self, names: &[&str], lookback: usize) -> bool {
        names
            .iter()
            .all(|n| (0..=lookback).all(|l| self.indicators.value(n, l).is_ok()))
    }

    /// `a` was at or below `b` on the previous bar and is above it now.
    pub fn crossed_above(&self, a: &str, b: &str) -> Result<bool, IndicatorError> {
        Ok(self.value(a, 1)? <= self.value(b, 1)? && self.value(a, 0)? > self.value(b, 0)?)
    }

    /// `a` was at or above `b` on the previous bar and is below it now.
    pub fn crossed_below(&self, a: &str, b: &str) -> Result<bool, IndicatorError> {
        Ok(self.value(a, 1)? >= self.value(b, 1)? && self.value(a, 0)? < self.value(b, 0)?)
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_flat()
    }

    pub fn has_live_orders(&self) -> bool {
        !self.live_orders.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::BarSeries;

    /// Drive a strategy over bars with a flat position and fixed cash,
    /// collecting the intents emitted on each bar.
    pub fn collect_intents(
        strategy: &mut dyn Strategy,
        bars: Vec<Bar>,
    ) -> Vec<(usize, Vec<OrderIntent>)> {
        let mut series = BarSeries::new(bars).unwrap();
        let mut indicators = IndicatorSet::from_indicators(strategy.indicators());
        let position = Position::default();
        let mut out = Vec::new();
        let mut index = 0;
        while let Some(bar) = series.advance().copied() {
            indicators.update(&bar);
            let ctx = StrategyContext {
                bar: &bar,
                bar_index: index,
                series: &series,
                indicators: &indicators,
                position: &position,
                cash: 10_000.0,
                live_orders: &[],
            };
            let mut port = OrderPort::new();
            strategy.on_bar(&ctx, &mut port).unwrap();
            if !port.is_empty() {
                out.push((index, port.drain()));
            }
            index += 1;
        }
        out
    }
}
