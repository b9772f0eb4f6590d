//! Trade — an immutable record of a closed (or partially closed) position.

use super::position::PositionSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOutcome {
    Won,
    Lost,
    Breakeven,
}

impl TradeOutcome {
    pub fn from_pnl(pnl: f64) -> Self {
        if pnl > 0.0 {
            TradeOutcome::Won
        } else if pnl < 0.0 {
            TradeOutcome::Lost
        } else {
            TradeOutcome::Breakeven
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub side: PositionSide,

    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    pub exit_bar: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,

    /// Closed size, always positive.
    pub size: f64,

    /// Price pnl: `(exit - entry) * size`, sign flipped for shorts.
    pub pnl: f64,
    pub commission: f64,
    pub net_pnl: f64,
    pub outcome: TradeOutcome,

    pub bars_held: usize,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        side: PositionSide,
        entry_bar: usize,
        entry_time: DateTime<Utc>,
        entry_price: f64,
        exit_bar: usize,
        exit_time: DateTime<Utc>,
        exit_price: f64,
        size: f64,
        commission: f64,
    ) -> Self {
        let pnl = (exit_price - entry_price) * size * side.sign();
        let net_pnl = pnl - commission;
        Self {
            side,
            entry_bar,
            entry_time,
            entry_price,
            exit_bar,
            exit_time,
            exit_price,
            size,
            pnl,
            commission,
            net_pnl,
            outcome: TradeOutcome::from_pnl(net_pnl),
            bars_held: exit_bar.saturating_sub(entry_bar),
        }
    }

    /// Return on the trade as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.size == 0.0 {
            return 0.0;
        }
        self.net_pnl / (self.entry_price * self.size)
    }

    pub fn is_winner(&self) -> bool {
        self.outcome == TradeOutcome::Won
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(side: PositionSide, entry: f64, exit: f64, commission: f64) -> Trade {
        Trade::new(
            side,
            4,
            Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            entry,
            8,
            Utc.with_ymd_and_hms(2024, 1, 5, 4, 0, 0).unwrap(),
            exit,
            50.0,
            commission,
        )
    }

    #[test]
    fn long_pnl() {
        let t = trade(PositionSide::Long, 100.0, 110.0, 10.0);
        assert_eq!(t.pnl, 500.0);
        assert_eq!(t.net_pnl, 490.0);
        assert_eq!(t.bars_held, 4);
        assert!(t.is_winner());
        assert!((t.return_pct() - 490.0 / 5000.0).abs() < 1e-12);
    }

    #[test]
    fn short_pnl_is_inverted() {
        let t = trade(PositionSide::Short, 100.0, 110.0, 0.0);
        assert_eq!(t.pnl, -500.0);
        assert_eq!(t.outcome, TradeOutcome::Lost);
    }

    #[test]
    fn commission_can_turn_flat_trade_into_loss() {
        assert_eq!(
            trade(PositionSide::Long, 100.0, 100.0, 0.0).outcome,
            TradeOutcome::Breakeven
        );
        assert_eq!(
            trade(PositionSide::Long, 100.0, 100.0, 1.0).outcome,
            TradeOutcome::Lost
        );
    }
}
