//! Strategy selection by name.

use super::{
    CrossoverStochRsi, MaCross, Strategy, StrategyParams, TripleEma, TripleSupertrend,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error(
        "unknown strategy '{0}' (expected one of MaCross, TripleSupertrend, \
         CrossoverStochRSI, TripleEMaStrategy)"
    )]
    UnknownStrategy(String),

    #[error("strategy {strategy} has no parameter '{param}'")]
    UnknownParam { strategy: String, param: String },

    #[error("missing parameter '{0}'")]
    MissingParam(String),

    #[error("parameter '{param}' = {value} is invalid: expected {expected}")]
    InvalidParam {
        param: String,
        value: f64,
        expected: &'static str,
    },
}

/// The closed set of built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StrategyKind {
    MaCross,
    TripleSupertrend,
    CrossoverStochRsi,
    TripleEma,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::MaCross,
        StrategyKind::TripleSupertrend,
        StrategyKind::CrossoverStochRsi,
        StrategyKind::TripleEma,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::MaCross => MaCross::NAME,
            StrategyKind::TripleSupertrend => TripleSupertrend::NAME,
            StrategyKind::CrossoverStochRsi => CrossoverStochRsi::NAME,
            StrategyKind::TripleEma => TripleEma::NAME,
        }
    }

    pub fn default_params(self) -> StrategyParams {
        match self {
            StrategyKind::MaCross => MaCross::default_params(),
            StrategyKind::TripleSupertrend => TripleSupertrend::default_params(),
            StrategyKind::CrossoverStochRsi => CrossoverStochRsi::default_params(),
            StrategyKind::TripleEma => TripleEma::default_params(),
        }
    }

    /// Build a strategy from its defaults with `overrides` applied.
    pub fn build(
        self,
        overrides: &BTreeMap<String, f64>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let params = self.default_params().merge(self.as_str(), overrides)?;
        Ok(match self {
            StrategyKind::MaCross => Box::new(MaCross::from_params(params)?),
            StrategyKind::TripleSupertrend => Box::new(TripleSupertrend::from_params(params)?),
            StrategyKind::CrossoverStochRsi => Box::new(CrossoverStochRsi::from_params(params)?),
            StrategyKind::TripleEma => Box::new(TripleEma::from_params(params)?),
        })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| StrategyError::UnknownStrategy(s.to_string()))
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = StrategyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StrategyKind> for String {
    fn from(k: StrategyKind) -> Self {
        k.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_names_roundtrip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!(
            "CrossoverStochRSI".parse::<StrategyKind>().unwrap(),
            StrategyKind::CrossoverStochRsi
        );
        assert_eq!(
            "TripleEMaStrategy".parse::<StrategyKind>().unwrap(),
            StrategyKind::TripleEma
        );
    }

    #[test]
    fn unknown_selector_is_error() {
        assert_eq!(
            "Buffett".parse::<StrategyKind>(),
            Err(StrategyError::UnknownStrategy("Buffett".into()))
        );
    }

    #[test]
    fn build_every_kind_with_defaults() {
        for kind in StrategyKind::ALL {
            let s = kind.build(&BTreeMap::new()).unwrap();
            assert_eq!(s.name(), kind.as_str());
            assert!(!s.indicators().is_empty());
            assert_eq!(s.params(), &kind.default_params());
        }
    }

    #[test]
    fn build_rejects_bad_override() {
        let mut o = BTreeMap::new();
        o.insert("fast_length".to_string(), 0.0);
        assert!(matches!(
            StrategyKind::MaCross.build(&o),
            Err(StrategyError::InvalidParam { .. })
        ));
    }

    #[test]
    fn serde_uses_selector_names() {
        let json = serde_json::to_string(&StrategyKind::TripleEma).unwrap();
        assert_eq!(json, "\"TripleEMaStrategy\"");
    }
}
