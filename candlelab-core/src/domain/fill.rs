use crate::domain::ids::OrderId;
use crate::domain::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fill record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub price: f64,
    pub size: f64,
    pub commission: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.size
    }
}
