//! Named numeric strategy parameters.
//!
//! Uses `BTreeMap` for deterministic ordering in reports and run hashing.

use super::kind::StrategyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, f64>);

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }

    /// Apply overrides on top of these defaults. Every override must name a known parameter.
    pub fn merge(
        mut self,
        strategy: &str,
        overrides: &BTreeMap<String, f64>,
    ) -> Result<Self, StrategyError> {
        for (name, &value) in overrides {
            match self.0.get_mut(name) {
                Some(slot) => *slot = value,
                None => {
                    return Err(StrategyError::UnknownParam {
                        strategy: strategy.to_string(),
                        param: name.clone(),
                    })
                }
            }
        }
        Ok(self)
    }

    fn require(&self, name: &str) -> Result<f64, StrategyError> {
        self.get(name)
            .ok_or_else(|| StrategyError::MissingParam(name.to_string()))
    }

    /// A lookback length: a whole number >= 1.
    pub fn period(&self, name: &str) -> Result<usize, StrategyError> {
        match self.period_or_zero(name)? {
            0 => Err(StrategyError::InvalidParam {
                param: name.to_string(),
                value: 0.0,
                expected: "a whole number >= 1",
            }),
            p => Ok(p),
        }
    }

    /// A lookback length where 0 disables the feature.
    pub fn period_or_zero(&self, name: &str) -> Result<usize, StrategyError> {
        let v = self.require(name)?;
        if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
            return Err(StrategyError::InvalidParam {
                param: name.to_string(),
                value: v,
                expected: "a whole number >= 0",
            });
        }
        Ok(v as usize)
    }

    /// A fraction in (0, 1).
    pub fn fraction(&self, name: &str) -> Result<f64, StrategyError> {
        let v = self.require(name)?;
        if !(v > 0.0 && v < 1.0) {
            return Err(StrategyError::InvalidParam {
                param: name.to_string(),
                value: v,
                expected: "a fraction in (0, 1)",
            });
        }
        Ok(v)
    }

    /// A positive finite number.
    pub fn positive(&self, name: &str) -> Result<f64, StrategyError> {
        let v = self.require(name)?;
        if !(v.is_finite() && v > 0.0) {
            return Err(StrategyError::InvalidParam {
                param: name.to_string(),
                value: v,
                expected: "a positive number",
            });
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overrides_known_params() {
        let defaults = StrategyParams::new().with("fast_length", 50.0);
        let mut o = BTreeMap::new();
        o.insert("fast_length".to_string(), 20.0);
        let merged = defaults.merge("MaCross", &o).unwrap();
        assert_eq!(merged.period("fast_length").unwrap(), 20);
    }

    #[test]
    fn merge_rejects_unknown_params() {
        let mut o = BTreeMap::new();
        o.insert("nope".to_string(), 1.0);
        assert!(matches!(
            StrategyParams::new().merge("MaCross", &o),
            Err(StrategyError::UnknownParam { .. })
        ));
    }

    #[test]
    fn period_validation() {
        let p = StrategyParams::new()
            .with("a", 0.0)
            .with("b", 2.5)
            .with("c", 14.0);
        assert!(p.period("a").is_err());
        assert_eq!(p.period_or_zero("a").unwrap(), 0);
        assert!(p.period("b").is_err());
        assert_eq!(p.period("c").unwrap(), 14);
        assert!(matches!(p.period("d"), Err(StrategyError::MissingParam(_))));
    }

    #[test]
    fn fraction_validation() {
        let p = StrategyParams::new().with("tp", 0.08).with("bad", 1.5);
        assert_eq!(p.fraction("tp").unwrap(), 0.08);
        assert!(p.fraction("bad").is_err());
    }
}
