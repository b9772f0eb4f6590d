//! TripleSupertrend — Stochastic RSI reversals confirmed by trend and SuperTrend.
//!
//! Flat, long side: %K below the lower band crossing above %D, EMA below the
//! close and the close below the slow SuperTrend → limit buy bracket.
//! Short side mirrored. The fast and mid SuperTrends are computed for charting
//! only; decisions read the slow one.

use super::stoch_rsi_cross::StochTrigger;
use super::{OrderPort, Strategy, StrategyContext, StrategyError, StrategyParams};
use crate::domain::OrderSide;
use crate::indicators::{Ema, Indicator, IndicatorError, Supertrend};

#[derive(Debug, Clone)]
pub struct TripleSupertrend {
    params: StrategyParams,
    trigger: StochTrigger,
    ema_length: usize,
    /// (period, multiplier) for fast, mid, slow.
    bands: [(usize, f64); 3],
    ema_key: String,
    slow_key: String,
}

impl TripleSupertrend {
    pub const NAME: &'static str = "TripleSupertrend";

    pub fn default_params() -> StrategyParams {
        StochTrigger::add_defaults(
            StrategyParams::new()
                .with("ema_length", 200.0)
                .with("atr_fast_length", 10.0)
                .with("atr_mid_length", 11.0)
                .with("atr_slow_length", 12.0)
                .with("fast_multiplier", 1.0)
                .with("mid_multiplier", 2.0)
                .with("slow_multiplier", 3.0),
        )
    }

    pub fn from_params(params: StrategyParams) -> Result<Self, StrategyError> {
        let ema_length = params.period("ema_length")?;
        let bands = [
            (
                params.period("atr_fast_length")?,
                params.positive("fast_multiplier")?,
            ),
            (
                params.period("atr_mid_length")?,
                params.positive("mid_multiplier")?,
            ),
            (
                params.period("atr_slow_length")?,
                params.positive("slow_multiplier")?,
            ),
        ];
        let (slow_period, slow_mult) = bands[2];
        Ok(Self {
            trigger: StochTrigger::from_params(&params)?,
            ema_length,
            bands,
            ema_key: format!("ema_{ema_length}"),
            slow_key: Supertrend::new(slow_period, slow_mult).name().to_string(),
            params,
        })
    }
}

impl Strategy for TripleSupertrend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn params(&self) -> &StrategyParams {
        &self.params
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        let mut v: Vec<Box<dyn Indicator>> = vec![Box::new(Ema::new(self.ema_length))];
        for (period, mult) in self.bands {
            v.push(Box::new(Supertrend::new(period, mult)));
        }
        v.extend(self.trigger.indicators());
        v
    }

    fn on_bar(
        &mut self,
        ctx: &StrategyContext<'_>,
        port: &mut OrderPort,
    ) -> Result<(), IndicatorError> {
        if !ctx.is_flat()
            || ctx.has_live_orders()
            || !self.trigger.ready(ctx)
            || !ctx.has_history(&[&self.ema_key, &self.slow_key], 0)
        {
            return Ok(());
        }

        let Some(side) = self.trigger.signal(ctx)? else {
            return Ok(());
        };
        let close = ctx.bar.close;
        let ema = ctx.value(&self.ema_key, 0)?;
        let supertrend = ctx.value(&self.slow_key, 0)?;
        let confirmed = match side {
            OrderSide::Buy => ema < close && close < supertrend,
            OrderSide::Sell => ema > close && close > supertrend,
        };
        if confirmed {
            self.trigger.submit(side, close, ctx.bar_index, port);
        }
        Ok(())
    }
}
