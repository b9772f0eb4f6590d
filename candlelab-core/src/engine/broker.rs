//! Broker — cash, position and order execution for a single run.
//!
//! Intents are turned into orders by `submit` on the bar they were emitted
//! and matched by `resolve` from the next bar on. Every fill moves cash and
//! position together, so `cash + position value == equity` holds at every
//! bar boundary.

use super::order_book::{OrderBook, OrderBookError};
use super::path_policy::{evaluation_sequence, PathPolicy};
use super::sizer::PercentSizer;
use super::trigger::fill_price;
use crate::domain::{
    validate_order, Bar, Fill, IdGen, Order, OrderError, OrderEvent, OrderId, OrderKind,
    OrderRole, OrderSide, OrderStatus, Position, PositionSide, Trade,
};
use crate::strategy::{BracketIntent, OrderIntent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Execution settings shared by every order in a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Commission as a percentage of fill notional (0.1 = 0.1%).
    pub commission_pct: f64,
    pub path_policy: PathPolicy,
}

impl ExecutionConfig {
    pub fn frictionless() -> Self {
        Self {
            commission_pct: 0.0,
            path_policy: PathPolicy::WorstCase,
        }
    }

    fn commission_rate(&self) -> f64 {
        self.commission_pct / 100.0
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::frictionless()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    #[error(transparent)]
    InvalidOrder(#[from] OrderError),

    #[error(transparent)]
    OrderBook(#[from] OrderBookError),
}

#[derive(Debug)]
pub struct Broker {
    initial_cash: f64,
    cash: f64,
    position: Position,
    /// Entry commission still attributed to the open position.
    open_commission: f64,
    book: OrderBook,
    ids: IdGen,
    sizer: PercentSizer,
    config: ExecutionConfig,
    fills: Vec<Fill>,
    trades: Vec<Trade>,
    /// Trades closed since the last `take_closed_trades`.
    new_trades: usize,
    events: Vec<OrderEvent>,
}

impl Broker {
    pub fn new(initial_cash: f64, sizer: PercentSizer, config: ExecutionConfig) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            position: Position::default(),
            open_commission: 0.0,
            book: OrderBook::new(),
            ids: IdGen::default(),
            sizer,
            config,
            fills: Vec::new(),
            trades: Vec::new(),
            new_trades: 0,
            events: Vec::new(),
        }
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Cash plus the position marked at `mark`.
    pub fn equity(&self, mark: f64) -> f64 {
        self.cash + self.position.market_value(mark)
    }

    /// Snapshot of live orders, in id order.
    pub fn live_orders(&self) -> Vec<Order> {
        self.book.live_orders().into_iter().cloned().collect()
    }

    /// Lifecycle events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.events)
    }

    /// Trades closed since the last call.
    pub fn take_closed_trades(&mut self) -> &[Trade] {
        let start = self.trades.len() - self.new_trades;
        self.new_trades = 0;
        &self.trades[start..]
    }

    /// Turn an intent emitted on `bar` into orders. Returns the ids created or cancelled.
    ///
    /// A sized intent whose size rounds to zero is skipped without error.
    pub fn submit(
        &mut self,
        intent: &OrderIntent,
        bar: &Bar,
        bar_index: usize,
    ) -> Result<Vec<OrderId>, BrokerError> {
        match intent {
            OrderIntent::Single {
                side,
                kind,
                price,
                size,
            } => {
                let reference = price.unwrap_or(bar.close);
                let Some(size) = self.resolve_size(*size, reference) else {
                    return Ok(Vec::new());
                };
                validate_order(*kind, *price, size)?;
                let id = self.ids.next_order_id();
                self.book
                    .submit(Order::new(id, *side, *kind, *price, size, bar_index))?;
                debug!(order = %id, side = %side, kind = ?kind, size, price = ?price, "order submitted");
                Ok(vec![id])
            }
            OrderIntent::Bracket(bracket) => self.submit_bracket(bracket, bar, bar_index),
            OrderIntent::Close => {
                let Some(side) = self.position.side() else {
                    debug!("close requested while flat, ignored");
                    return Ok(Vec::new());
                };
                let size = self.position.size.abs();
                let side = match side {
                    PositionSide::Long => OrderSide::Sell,
                    PositionSide::Short => OrderSide::Buy,
                };
                let id = self.ids.next_order_id();
                self.book
                    .submit(Order::new(id, side, OrderKind::Market, None, size, bar_index))?;
                debug!(order = %id, side = %side, size, "close submitted");
                Ok(vec![id])
            }
            OrderIntent::Cancel(id) => {
                let cancelled = self.book.cancel(*id, bar_index, "cancelled by strategy")?;
                for &c in &cancelled {
                    debug!(order = %c, "order cancelled");
                    self.notify(c, bar_index);
                }
                Ok(cancelled)
            }
        }
    }

    fn submit_bracket(
        &mut self,
        bracket: &BracketIntent,
        bar: &Bar,
        bar_index: usize,
    ) -> Result<Vec<OrderId>, BrokerError> {
        let entry = match bracket.entry_kind {
            OrderKind::Market => bar.close,
            _ => bracket.entry_price.unwrap_or(bar.close),
        };
        let Some(size) = self.resolve_size(bracket.size, entry) else {
            return Ok(Vec::new());
        };
        validate_order(bracket.entry_kind, bracket.entry_price, size)?;

        let exit_side = bracket.side.opposite();
        if let Some(stop) = bracket.stop_price {
            validate_order(OrderKind::Stop, Some(stop), size)?;
            // Protective stop sits on the losing side of the entry.
            let wrong_side = match bracket.side {
                OrderSide::Buy => stop >= entry,
                OrderSide::Sell => stop <= entry,
            };
            if wrong_side {
                return Err(OrderError::InvalidBracket {
                    leg: "stop",
                    price: stop,
                    entry,
                }
                .into());
            }
        }
        if let Some(limit) = bracket.limit_price {
            validate_order(OrderKind::Limit, Some(limit), size)?;
            let wrong_side = match bracket.side {
                OrderSide::Buy => limit <= entry,
                OrderSide::Sell => limit >= entry,
            };
            if wrong_side {
                return Err(OrderError::InvalidBracket {
                    leg: "limit",
                    price: limit,
                    entry,
                }
                .into());
            }
        }

        let primary_id = self.ids.next_order_id();
        let primary = Order::new(
            primary_id,
            bracket.side,
            bracket.entry_kind,
            bracket.entry_price,
            size,
            bar_index,
        );
        let stop = bracket.stop_price.map(|p| {
            Order::new(
                self.ids.next_order_id(),
                exit_side,
                OrderKind::Stop,
                Some(p),
                size,
                bar_index,
            )
            .as_child(primary_id, OrderRole::StopChild)
        });
        let limit = bracket.limit_price.map(|p| {
            Order::new(
                self.ids.next_order_id(),
                exit_side,
                OrderKind::Limit,
                Some(p),
                size,
                bar_index,
            )
            .as_child(primary_id, OrderRole::LimitChild)
        });

        let mut ids = vec![primary_id];
        ids.extend(stop.as_ref().map(|o| o.id));
        ids.extend(limit.as_ref().map(|o| o.id));
        self.book.submit_bracket(primary, stop, limit)?;
        debug!(
            order = %primary_id,
            side = %bracket.side,
            size,
            entry = ?bracket.entry_price,
            stop = ?bracket.stop_price,
            limit = ?bracket.limit_price,
            "bracket submitted"
        );
        Ok(ids)
    }

    /// Explicit size, or the sizer's choice at `reference`. `None` means skip.
    fn resolve_size(&self, size: Option<f64>, reference: f64) -> Option<f64> {
        match size {
            Some(s) => Some(s),
            None => {
                let sized = self.sizer.size(self.cash, reference);
                if sized <= 0.0 {
                    debug!(cash = self.cash, price = reference, "sized to zero, intent skipped");
                    None
                } else {
                    Some(sized)
                }
            }
        }
    }

    /// Match live orders against a new bar.
    pub fn resolve(&mut self, bar: &Bar, bar_index: usize) -> Result<(), OrderBookError> {
        // Primaries submitted on earlier bars become eligible now.
        let due: Vec<OrderId> = self
            .book
            .live_orders()
            .into_iter()
            .filter(|o| {
                o.status == OrderStatus::Pending
                    && o.role == OrderRole::Primary
                    && o.created_bar < bar_index
            })
            .map(|o| o.id)
            .collect();
        for id in due {
            self.book.activate(id, bar_index)?;
        }

        let sequence = {
            let eligible: Vec<&Order> = self
                .book
                .live_orders()
                .into_iter()
                .filter(|o| o.status == OrderStatus::Active)
                .filter(|o| !o.is_child() || o.activated_bar.is_some_and(|a| a < bar_index))
                .collect();
            evaluation_sequence(
                &eligible,
                self.position.side(),
                self.config.path_policy,
                bar,
            )
        };

        for id in sequence {
            // An earlier fill on this bar may have cancelled it.
            let Some(order) = self.book.get(id).cloned() else {
                continue;
            };
            if order.status != OrderStatus::Active {
                continue;
            }
            if let Some(price) = fill_price(&order, bar) {
                self.execute(&order, price, bar, bar_index)?;
            }
        }
        Ok(())
    }

    fn execute(
        &mut self,
        order: &Order,
        price: f64,
        bar: &Bar,
        bar_index: usize,
    ) -> Result<(), OrderBookError> {
        let rate = self.config.commission_rate();
        let mut size = order.size;

        if order.is_child() {
            // A protective leg only closes what is open; it never reverses.
            let closable = match order.side {
                OrderSide::Sell => self.position.size.max(0.0),
                OrderSide::Buy => (-self.position.size).max(0.0),
            };
            if closable <= 0.0 {
                debug!(order = %order.id, "bracket leg has nothing to close, cancelled");
                for id in self.book.cancel(order.id, bar_index, "position already closed")? {
                    self.notify(id, bar_index);
                }
                for sibling in self.book.cancel_siblings(order.id, bar_index)? {
                    self.notify(sibling, bar_index);
                }
                return Ok(());
            }
            size = size.min(closable);
        }

        if order.side == OrderSide::Buy {
            let affordable = self.affordable(price * (1.0 + rate));
            if affordable < size {
                if affordable <= 0.0 {
                    warn!(
                        order = %order.id,
                        cash = self.cash,
                        price,
                        size,
                        "order rejected: insufficient cash"
                    );
                    self.book.reject(order.id, bar_index, "insufficient cash")?;
                    self.notify(order.id, bar_index);
                    self.cancel_children(order.id, bar_index, "parent rejected")?;
                    return Ok(());
                }
                debug!(order = %order.id, requested = size, capped = affordable, "buy capped to cash");
                size = affordable;
            }
        }

        let notional = price * size;
        let commission = notional * rate;
        self.cash -= order.side.sign() * notional + commission;

        let open_before = self.position.size.abs();
        let closed = self
            .position
            .apply_fill(order.side, size, price, bar_index, bar.timestamp);
        match closed {
            Some(lot) => {
                let exit_share = commission * lot.size / size;
                let entry_share = if open_before > 0.0 {
                    self.open_commission * lot.size / open_before
                } else {
                    0.0
                };
                self.open_commission -= entry_share;
                if self.position.is_flat() {
                    self.open_commission = 0.0;
                } else if lot.size < size {
                    // Flipped: the remainder opened a new position.
                    self.open_commission = commission - exit_share;
                }
                let trade = Trade::new(
                    lot.side,
                    lot.entry_bar,
                    lot.entry_time,
                    lot.entry_price,
                    bar_index,
                    bar.timestamp,
                    price,
                    lot.size,
                    entry_share + exit_share,
                );
                debug!(
                    side = ?trade.side,
                    entry = trade.entry_price,
                    exit = trade.exit_price,
                    size = trade.size,
                    pnl = trade.net_pnl,
                    "trade closed"
                );
                self.trades.push(trade);
                self.new_trades += 1;
            }
            None => self.open_commission += commission,
        }

        self.book.complete(order.id, price, size, bar_index)?;
        self.fills.push(Fill {
            order_id: order.id,
            bar_index,
            timestamp: bar.timestamp,
            side: order.side,
            price,
            size,
            commission,
        });
        debug!(order = %order.id, side = %order.side, price, size, commission, "order filled");
        self.notify(order.id, bar_index);

        match order.role {
            OrderRole::Primary => {
                // Legs protect what was actually bought, which may be less than requested.
                self.book.resize_children(order.id, size);
                self.book.activate_children(order.id, bar_index)?;
            }
            OrderRole::StopChild | OrderRole::LimitChild => {
                for sibling in self.book.cancel_siblings(order.id, bar_index)? {
                    debug!(order = %sibling, "bracket sibling cancelled");
                    self.notify(sibling, bar_index);
                }
            }
        }
        Ok(())
    }

    /// Largest lot-rounded size whose cost per unit `unit_cost` fits in cash.
    fn affordable(&self, unit_cost: f64) -> f64 {
        if self.cash <= 0.0 || unit_cost <= 0.0 {
            return 0.0;
        }
        let lot = self.sizer.lot;
        ((self.cash / unit_cost / lot).floor() * lot).max(0.0)
    }

    fn cancel_children(
        &mut self,
        parent: OrderId,
        bar_index: usize,
        reason: &str,
    ) -> Result<(), OrderBookError> {
        let children: Vec<OrderId> = self
            .book
            .children_of(parent)
            .into_iter()
            .filter(|o| o.is_live())
            .map(|o| o.id)
            .collect();
        for child in children {
            for id in self.book.cancel(child, bar_index, reason)? {
                self.notify(id, bar_index);
            }
        }
        Ok(())
    }

    fn notify(&mut self, id: OrderId, bar_index: usize) {
        if let Some(order) = self.book.get(id) {
            self.events.push(OrderEvent::from_order(order, bar_index));
        }
    }
}
