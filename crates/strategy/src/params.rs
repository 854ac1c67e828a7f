use std::collections::HashMap;

use serde_json::Value;

use common::{Error, Result};

/// Strategy configuration map as received from the control surface.
///
/// Typed accessors validate at strategy construction: an absent optional key
/// falls back to its default, but a present key of the wrong type is an
/// `InvalidParameters` error, never a silent default.
#[derive(Debug, Clone, Default)]
pub struct StrategyParams(HashMap<String, Value>);

impl StrategyParams {
    pub fn new(map: HashMap<String, Value>) -> Self {
        Self(map)
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| {
                Error::InvalidParameters(format!("'{key}' must be numeric, got {v}"))
            }),
        }
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| {
                    Error::InvalidParameters(format!(
                        "'{key}' must be a non-negative integer, got {v}"
                    ))
                }),
        }
    }

    pub fn str_or(&self, key: &str, default: &str) -> Result<String> {
        match self.0.get(key) {
            None => Ok(default.to_string()),
            Some(v) => v
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidParameters(format!("'{key}' must be a string"))),
        }
    }

    /// Ticker list, defaulting to `default` when the key is absent.
    /// An explicitly empty list is rejected.
    pub fn tickers_or(&self, default: &[&str]) -> Result<Vec<String>> {
        match self.0.get("tickers") {
            None => Ok(default.iter().map(|s| s.to_string()).collect()),
            Some(_) => self.required_tickers(),
        }
    }

    /// Ticker list that must be present and non-empty.
    pub fn required_tickers(&self) -> Result<Vec<String>> {
        let value = self
            .0
            .get("tickers")
            .ok_or_else(|| Error::InvalidParameters("'tickers' is required".into()))?;
        let list = value
            .as_array()
            .ok_or_else(|| Error::InvalidParameters("'tickers' must be a list".into()))?;
        if list.is_empty() {
            return Err(Error::InvalidParameters("'tickers' must not be empty".into()));
        }
        list.iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::InvalidParameters("'tickers' entries must be strings".into()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> StrategyParams {
        StrategyParams::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn absent_key_uses_default() {
        let p = params(&[]);
        assert_eq!(p.f64_or("kValue", 2.2).unwrap(), 2.2);
        assert_eq!(p.usize_or("nDays", 20).unwrap(), 20);
    }

    #[test]
    fn integer_value_reads_as_f64() {
        let p = params(&[("kValue", json!(3))]);
        assert_eq!(p.f64_or("kValue", 2.2).unwrap(), 3.0);
    }

    #[test]
    fn non_numeric_threshold_is_invalid() {
        let p = params(&[("kValue", json!("high"))]);
        assert!(matches!(
            p.f64_or("kValue", 2.2),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn empty_ticker_list_is_invalid() {
        let p = params(&[("tickers", json!([]))]);
        assert!(matches!(
            p.tickers_or(&["KRW-BTC"]),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn absent_tickers_fall_back_to_market() {
        let p = params(&[]);
        assert_eq!(p.tickers_or(&["KRW-BTC"]).unwrap(), vec!["KRW-BTC"]);
    }
}
