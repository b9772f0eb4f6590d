//! MaCross — moving average crossover with a long-term trend filter.
//!
//! Flat: fast SMA crosses above slow SMA while the close is above the trend
//! EMA → market buy. Long: fast SMA crosses below slow SMA → close.
//! `trend_length = 0` disables the trend filter.

use super::{OrderPort, Strategy, StrategyContext, StrategyError, StrategyParams};
use crate::indicators::{Ema, Indicator, IndicatorError, Sma};
use tracing::info;

#[derive(Debug, Clone)]
pub struct MaCross {
    params: StrategyParams,
    fast: usize,
    slow: usize,
    trend: usize,
    fast_key: String,
    slow_key: String,
    trend_key: Option<String>,
}

impl MaCross {
    pub const NAME: &'static str = "MaCross";

    pub fn default_params() -> StrategyParams {
        StrategyParams::new()
            .with("fast_length", 50.0)
            .with("slow_length", 200.0)
            .with("trend_length", 1000.0)
    }

    pub fn from_params(params: StrategyParams) -> Result<Self, StrategyError> {
        let fast = params.period("fast_length")?;
        let slow = params.period("slow_length")?;
        let trend = params.period_or_zero("trend_length")?;
        Ok(Self {
            fast,
            slow,
            trend,
            fast_key: format!("sma_{fast}"),
            slow_key: format!("sma_{slow}"),
            trend_key: (trend > 0).then(|| format!("ema_{trend}")),
            params,
        })
    }
}

impl Strategy for MaCross {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn params(&self) -> &StrategyParams {
        &self.params
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        let mut v: Vec<Box<dyn Indicator>> =
            vec![Box::new(Sma::new(self.fast)), Box::new(Sma::new(self.slow))];
        if self.trend > 0 {
            v.push(Box::new(Ema::new(self.trend)));
        }
        v
    }

    fn on_bar(
        &mut self,
        ctx: &StrategyContext<'_>,
        port: &mut OrderPort,
    ) -> Result<(), IndicatorError> {
        if !ctx.has_history(&[&self.fast_key, &self.slow_key], 1) {
            return Ok(());
        }

        if ctx.is_flat() {
            if !ctx.crossed_above(&self.fast_key, &self.slow_key)? {
                return Ok(());
            }
            let above_trend = match &self.trend_key {
                Some(key) if !ctx.has_history(&[key], 0) => false,
                Some(key) => ctx.bar.close > ctx.value(key, 0)?,
                None => true,
            };
            if above_trend {
                port.buy();
                info!(bar = ctx.bar_index, close = ctx.bar.close, "BUY CREATE, {:.2}", ctx.bar.close);
            }
        } else if ctx.position.is_long() && ctx.crossed_below(&self.fast_key, &self.slow_key)? {
            port.close();
            info!(bar = ctx.bar_index, close = ctx.bar.close, "CLOSE CREATE, {:.2}", ctx.bar.close);
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

    fn strategy(fast: f64, slow: f64, trend: f64) -> MaCross {
        MaCross::from_params(
            MaCross::default_params()
                .with("fast_length", fast)
                .with("slow_length", slow)
                .with("trend_length", trend),
        )
        .unwrap()
    }

    #[test]
    fn buys_on_golden_cross_when_flat() {
        let mut closes = vec![100.0; 6];
        closes.extend([99.0, 98.0, 104.0, 106.0]);
        let mut s = strategy(2.0, 4.0, 0.0);
        let intents = collect_intents(&mut s, make_bars(&closes));
        assert_eq!(intents.len(), 1);
        assert!(matches!(intents[0].1[0], OrderIntent::Single { .. }));
    }

    #[test]
    fn trend_filter_blocks_entry_below_trend() {
        let mut closes = vec![200.0; 6];
        closes.extend([100.0; 6]);
        closes.extend([99.0, 98.0, 104.0, 106.0]);
        let mut s = strategy(2.0, 4.0, 10.0);
        assert!(collect_intents(&mut s, make_bars(&closes)).is_empty());
    }

    #[test]
    fn indicator_set_depends_on_trend_filter() {
        assert_eq!(strategy(50.0, 200.0, 0.0).indicators().len(), 2);
        let names: Vec<String> = strategy(50.0, 200.0, 1000.0)
            .indicators()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["sma_50", "sma_200", "ema_1000"]);
    }
}
