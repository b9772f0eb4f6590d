//! Position sizing for intents that leave the size to the engine.

use serde::{Deserialize, Serialize};

/// Commit a fixed percentage of available cash per entry.
///
/// `size = floor(cash * percent / 100 / price / lot) * lot`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentSizer {
    /// In (0, 100].
    pub percent: f64,
    /// Smallest tradable increment. 1.0 trades whole units.
    pub lot: f64,
}

impl PercentSizer {
    pub fn new(percent: f64) -> Self {
        Self { percent, lot: 1.0 }
    }

    pub fn with_lot(mut self, lot: f64) -> Self {
        self.lot = lot;
        self
    }

    /// Size for an entry at `price` given `cash`. Zero means "cannot afford one lot".
    pub fn size(&self, cash: f64, price: f64) -> f64 {
        if cash <= 0.0 || price <= 0.0 || !price.is_finite() || self.lot <= 0.0 {
            return 0.0;
        }
        let raw = cash * self.percent / 100.0 / price;
        // Guard against 49.999999 style float noise before flooring.
        let lots = (raw / self.lot + 1e-9).floor();
        (lots * self.lot).max(0.0)
    }
}

impl Default for PercentSizer {
    fn default() -> Self {
        Self::new(100.0)
    }
}
