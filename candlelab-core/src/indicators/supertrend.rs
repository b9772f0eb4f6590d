//! Supertrend — ATR-based trailing band.
//!
//! basic bands: hl2 ± multiplier * ATR(period).
//! The final upper band only moves down (and the final lower band only up)
//! unless the previous close broke through it. The output sits on the upper
//! band while price stays at or below it, and switches to the lower band when
//! the close breaks above it (mirrored for the way back).
//!
//! First value after `period + 1` bars; it starts on the upper band.

use super::atr::Atr;
use super::{Indicator, ValueHistory};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy)]
struct Bands {
    upper: f64,
    lower: f64,
    on_upper: bool,
}

#[derive(Debug, Clone)]
pub struct Supertrend {
    period: usize,
    multiplier: f64,
    name: String,
    atr: Atr,
    prev_close: Option<f64>,
    bands: Option<Bands>,
    history: ValueHistory,
}

impl Supertrend {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Supertrend period must be >= 1");
        Self {
            period,
            multiplier,
            name: format!("supertrend_{period}_{multiplier}"),
            atr: Atr::new(period),
            prev_close: None,
            bands: None,
            history: ValueHistory::default(),
        }
    }

    /// Whether the output currently follows the lower band (price trending up).
    pub fn is_uptrend(&self) -> Option<bool> {
        self.bands.map(|b| !b.on_upper)
    }

    fn step(&mut self, bar: &Bar) -> Option<f64> {
        self.atr.update(bar);
        let atr = self.atr.value(0).ok()?;
        let hl2 = (bar.high + bar.low) / 2.0;
        let basic_upper = hl2 + self.multiplier * atr;
        let basic_lower = hl2 - self.multiplier * atr;

        let next = match (self.bands, self.prev_close) {
            (Some(prev), Some(prev_close)) => {
                let upper = if basic_upper < prev.upper || prev_close > prev.upper {
                    basic_upper
                } else {
                    prev.upper
                };
                let lower = if basic_lower > prev.lower || prev_close < prev.lower {
                    basic_lower
                } else {
                    prev.lower
                };
                let on_upper = if prev.on_upper {
                    bar.close <= upper
                } else {
                    bar.close < lower
                };
                Bands {
                    upper,
                    lower,
                    on_upper,
                }
            }
            _ => Bands {
                upper: basic_upper,
                lower: basic_lower,
                on_upper: true,
            },
        };

        self.bands = Some(next);
        Some(if next.on_upper { next.upper } else { next.lower })
    }
}

impl Indicator for Supertrend {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_period(&self) -> usize {
        self.period + 1
    }

    fn update(&mut self, bar: &Bar) {
        let v = self.step(bar);
        self.prev_close = Some(bar.close);
        self.history.push(v);
    }

    fn history(&self) -> &ValueHistory {
        &self.history
    }
}
