//! CrossoverStochRSI — Stochastic RSI reversal entries with bracket exits.
//!
//! Flat: %K below the lower band and crossing above %D → limit buy bracket at
//! the close; %K above the upper band and crossing below %D → limit sell
//! bracket at the close.
//!
//! Long bracket: stop at close·(1 − stop_loss), take-profit at close·(1 + take_profit).
//! Short bracket: stop at close·(1 + take_profit), take-profit at close·(1 − stop_loss).

use super::{OrderPort, Strategy, StrategyContext, StrategyError, StrategyParams};
use crate::domain::OrderSide;
use crate::indicators::stoch_rsi::StochRsiParams;
use crate::indicators::{Indicator, IndicatorError, StochRsi};
use tracing::info;

/// Stochastic RSI crossover trigger plus bracket geometry, shared by the
/// stochastic strategies.
#[derive(Debug, Clone)]
pub(crate) struct StochTrigger {
    stoch: StochRsiParams,
    upper: f64,
    lower: f64,
    take_profit: f64,
    stop_loss: f64,
    k_key: String,
    d_key: String,
}

impl StochTrigger {
    pub(crate) fn add_defaults(params: StrategyParams) -> StrategyParams {
        params
            .with("k_period", 3.0)
            .with("d_period", 3.0)
            .with("rsi_period", 14.0)
            .with("stoch_period", 14.0)
            .with("upperband", 80.0)
            .with("lowerband", 20.0)
            .with("take_profit", 0.08)
            .with("stop_loss", 0.04)
    }

    pub(crate) fn from_params(params: &StrategyParams) -> Result<Self, StrategyError> {
        let stoch = StochRsiParams {
            k_period: params.period("k_period")?,
            d_period: params.period("d_period")?,
            rsi_period: params.period("rsi_period")?,
            stoch_period: params.period("stoch_period")?,
        };
        let k_key = StochRsi::k(stoch).name().to_string();
        let d_key = StochRsi::d(stoch).name().to_string();
        Ok(Self {
            stoch,
            upper: params.positive("upperband")?,
            lower: params.positive("lowerband")?,
            take_profit: params.fraction("take_profit")?,
            stop_loss: params.fraction("stop_loss")?,
            k_key,
            d_key,
        })
    }

    pub(crate) fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![
            Box::new(StochRsi::k(self.stoch)),
            Box::new(StochRsi::d(self.stoch)),
        ]
    }

    pub(crate) fn ready(&self, ctx: &StrategyContext<'_>) -> bool {
        ctx.has_history(&[&self.k_key, &self.d_key], 1)
    }

    /// Direction of a stochastic reversal on this bar, if any.
    pub(crate) fn signal(
        &self,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<OrderSide>, IndicatorError> {
        let k = ctx.value(&self.k_key, 0)?;
        if k < self.lower && ctx.crossed_above(&self.k_key, &self.d_key)? {
            return Ok(Some(OrderSide::Buy));
        }
        if k > self.upper && ctx.crossed_below(&self.k_key, &self.d_key)? {
            return Ok(Some(OrderSide::Sell));
        }
        Ok(None)
    }

    pub(crate) fn submit(&self, side: OrderSide, close: f64, bar: usize, port: &mut OrderPort) {
        let below = close * (1.0 - self.stop_loss);
        let above = close * (1.0 + self.take_profit);
        match side {
            OrderSide::Buy => port.buy_bracket(close, below, above),
            OrderSide::Sell => port.sell_bracket(close, above, below),
        }
        info!(bar, %side, entry = close, "BRACKET CREATE, {:.2}", close);
    }
}

#[derive(Debug, Clone)]
pub struct CrossoverStochRsi {
    params: StrategyParams,
    trigger: StochTrigger,
}

impl CrossoverStochRsi {
    pub const NAME: &'static str = "CrossoverStochRSI";

    pub fn default_params() -> StrategyParams {
        StochTrigger::add_defaults(StrategyParams::new())
    }

    pub fn from_params(params: StrategyParams) -> Result<Self, StrategyError> {
        Ok(Self {
            trigger: StochTrigger::from_params(&params)?,
            params,
        })
    }
}

impl Strategy for CrossoverStochRsi {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn params(&self) -> &StrategyParams {
        &self.params
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        self.trigger.indicators()
    }

    fn on_bar(
        &mut self,
        ctx: &StrategyContext<'_>,
        port: &mut OrderPort,
    ) -> Result<(), IndicatorError> {
        if !ctx.is_flat() || ctx.has_live_orders() || !self.trigger.ready(ctx) {
            return Ok(());
        }
        if let Some(side) = self.trigger.signal(ctx)? {
            self.trigger.submit(side, ctx.bar.close, ctx.bar_index, port);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;
    use crate::strategy::test_support::collect_intents;
    use crate::strategy::OrderIntent;

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 10.0 * (i as f64 * 0.2).sin() + 0.01 * i as f64)
            .collect()
    }

    #[test]
    fn brackets_follow_stochastic_reversals() {
        let mut s = CrossoverStochRsi::from_params(CrossoverStochRsi::default_params()).unwrap();
        let bars = make_bars(&wave(300));
        let intents = collect_intents(&mut s, bars.clone());
        assert!(!intents.is_empty());

        for (bar, batch) in intents {
            assert!(bar >= 30, "signal before warmup at bar {bar}");
            let close = bars[bar].close;
            match &batch[0] {
                OrderIntent::Bracket(b) => {
                    assert_eq!(b.entry_price, Some(close));
                    let (stop, tp) = (b.stop_price.unwrap(), b.limit_price.unwrap());
                    match b.side {
                        OrderSide::Buy => {
                            assert!((stop - close * 0.96).abs() < 1e-9);
                            assert!((tp - close * 1.08).abs() < 1e-9);
                        }
                        OrderSide::Sell => {
                            assert!((stop - close * 1.08).abs() < 1e-9);
                            assert!((tp - close * 0.96).abs() < 1e-9);
                        }
                    }
                }
                other => panic!("expected bracket, got {other:?}"),
            }
        }
    }

    #[test]
    fn flat_series_never_signals() {
        let mut s = CrossoverStochRsi::from_params(CrossoverStochRsi::default_params()).unwrap();
        assert!(collect_intents(&mut s, make_bars(&[100.0; 100])).is_empty());
    }
}
