use serde::{Deserialize, Serialize};
use std::fmt;

/// Order ID, unique within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Sequential ID generator. Deterministic: a fresh generator always yields 1, 2, 3, ...
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    last_order: u64,
}

impl IdGen {
    pub fn next_order_id(&mut self) -> OrderId {
        self.last_order += 1;
        OrderId(self.last_order)
    }
}
