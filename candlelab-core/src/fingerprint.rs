//! Run fingerprinting — deterministic content hashes of configurations and results.
//!
//! - `StrategyConfig`: selector name plus resolved parameters.
//! - `ContentHash`: BLAKE3 hex digest of a canonical JSON serialization.
//! - `result_fingerprint`: hash of the equity curve and trade list of a run.
//!
//! Two runs over the same bars with the same configuration must produce the
//! same result fingerprint.

use crate::domain::Trade;
use crate::engine::{EquityPoint, RunResult};
use crate::strategy::StrategyParams;
use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 digest, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// Serialize `value` to JSON and hash it.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(value)?;
        Ok(Self::from_bytes(&json))
    }

    /// First `n` hex characters, for display.
    pub fn short(&self, n: usize) -> &str {
        &self.0[..n.min(self.0.len())]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strategy identity: selector plus every resolved parameter.
///
/// `StrategyParams` is a `BTreeMap`, so serialization order is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy: String,
    pub params: StrategyParams,
}

impl StrategyConfig {
    pub fn new(strategy: impl Into<String>, params: StrategyParams) -> Self {
        Self {
            strategy: strategy.into(),
            params,
        }
    }

    pub fn full_hash(&self) -> Result<ContentHash, serde_json::Error> {
        ContentHash::of(self)
    }
}

#[derive(Serialize)]
struct ResultContent<'a> {
    equity_curve: &'a [EquityPoint],
    trades: &'a [Trade],
}

/// Hash of the serialized equity curve and trades.
pub fn result_fingerprint(
    equity_curve: &[EquityPoint],
    trades: &[Trade],
) -> Result<ContentHash, serde_json::Error> {
    ContentHash::of(&ResultContent {
        equity_curve,
        trades,
    })
}

impl RunResult {
    pub fn fingerprint(&self) -> Result<ContentHash, serde_json::Error> {
        result_fingerprint(&self.equity_curve, &self.trades)
    }
}
