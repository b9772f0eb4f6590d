//! TripleEMaStrategy — three SMAs with EMA trend entry and Hull exit.
//!
//! Flat: fast SMA crosses above slow SMA while the close is above the trend
//! EMA → market buy. Long: fast SMA crosses below mid SMA, or the close drops
//! below the Hull MA → close.

use super::{OrderPort, Strategy, StrategyContext, StrategyError, StrategyParams};
use crate::domain::{OrderEvent, OrderSide, OrderStatus};
use crate::indicators::{Ema, Hma, Indicator, IndicatorError, Sma};
use tracing::info;

#[derive(Debug, Clone)]
pub struct TripleEma {
    params: StrategyParams,
    fast: usize,
    mid: usize,
    slow: usize,
    hull: usize,
    trend: usize,
    fast_key: String,
    mid_key: String,
    slow_key: String,
    hull_key: String,
    trend_key: String,
}

impl TripleEma {
    pub const NAME: &'static str = "TripleEMaStrategy";

    pub fn default_params() -> StrategyParams {
        StrategyParams::new()
            .with("fast_length", 50.0)
            .with("mid_length", 200.0)
            .with("slow_length", 500.0)
            .with("hull_length", 1000.0)
            .with("trend_length", 1000.0)
    }

    pub fn from_params(params: StrategyParams) -> Result<Self, StrategyError> {
        let fast = params.period("fast_length")?;
        let mid = params.period("mid_length")?;
        let slow = params.period("slow_length")?;
        let hull = params.period("hull_length")?;
        if hull < 2 {
            return Err(StrategyError::InvalidParam {
                param: "hull_length".into(),
                value: hull as f64,
                expected: "a whole number >= 2",
            });
        }
        let trend = params.period("trend_length")?;
        Ok(Self {
            fast,
            mid,
            slow,
            hull,
            trend,
            fast_key: format!("sma_{fast}"),
            mid_key: format!("sma_{mid}"),
            slow_key: format!("sma_{slow}"),
            hull_key: format!("hma_{hull}"),
            trend_key: format!("ema_{trend}"),
            params,
        })
    }
}

impl Strategy for TripleEma {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn params(&self) -> &StrategyParams {
        &self.params
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![
            Box::new(Sma::new(self.fast)),
            Box::new(Sma::new(self.mid)),
            Box::new(Sma::new(self.slow)),
            Box::new(Hma::new(self.hull)),
            Box::new(Ema::new(self.trend)),
        ]
    }

    fn on_bar(
        &mut self,
        ctx: &StrategyContext<'_>,
        port: &mut OrderPort,
    ) -> Result<(), IndicatorError> {
        if !ctx.has_history(&[&self.fast_key, &self.mid_key, &self.slow_key], 1)
            || !ctx.has_history(&[&self.hull_key, &self.trend_key], 0)
        {
            return Ok(());
        }

        let close = ctx.bar.close;
        if ctx.is_flat() {
            if ctx.crossed_above(&self.fast_key, &self.slow_key)?
                && close > ctx.value(&self.trend_key, 0)?
            {
                port.buy();
            }
        } else if ctx.position.is_long()
            && (ctx.crossed_below(&self.fast_key, &self.mid_key)?
                || close < ctx.value(&self.hull_key, 0)?)
        {
            port.close();
        }
        Ok(())
    }

    fn on_order(&mut self, event: &OrderEvent) {
        match &event.status {
            OrderStatus::Completed => {
                let label = match event.side {
                    OrderSide::Buy => "BUY",
                    OrderSide::Sell => "SELL",
                };
                let price = event.price.unwrap_or(f64::NAN);
                info!(order = %event.order_id, "{label} @price: {price:.2}");
            }
            OrderStatus::Cancelled { reason } => {
                info!(order = %event.order_id, side = %event.side, %reason, "CANCEL");
            }
            _ => {}
        }
    }
}
