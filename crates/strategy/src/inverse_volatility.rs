use std::collections::HashMap;

use common::{CandleInterval, Error, MarketDataPort, Result};

use crate::params::StrategyParams;
use crate::stats::volatility;

/// Inverse-volatility portfolio allocator.
///
/// Not a per-tick signal strategy: one call produces a weight per ticker,
/// proportional to the inverse of that ticker's volatility (standard
/// deviation of day-over-day percentage changes over the lookback window),
/// normalized to sum to 1.
pub struct InverseVolatility {
    tickers: Vec<String>,
    volatility_window: usize,
}

impl InverseVolatility {
    pub fn from_params(params: &StrategyParams) -> Result<Self> {
        let tickers = params.required_tickers()?;
        if tickers.len() < 2 {
            return Err(Error::InvalidParameters(format!(
                "inverse_volatility requires at least 2 tickers, got {}",
                tickers.len()
            )));
        }
        let volatility_window = params.usize_or("volatility_window", 20)?;
        if volatility_window < 2 {
            return Err(Error::InvalidParameters(
                "'volatility_window' must be at least 2".into(),
            ));
        }
        Ok(Self {
            tickers,
            volatility_window,
        })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Compute weights from per-ticker OLDEST-FIRST close series.
    ///
    /// Fails with `DegenerateVolatility` naming the first ticker whose
    /// volatility is exactly zero; no partial result is produced.
    pub fn weights(&self, series: &[(String, Vec<f64>)]) -> Result<HashMap<String, f64>> {
        let mut inverse: Vec<(String, f64)> = Vec::with_capacity(series.len());
        for (ticker, closes) in series {
            if closes.len() < 2 {
                return Err(Error::InsufficientData {
                    required: self.volatility_window,
                    got: closes.len(),
                });
            }
            let vol = volatility(closes);
            if vol == 0.0 {
                return Err(Error::DegenerateVolatility(ticker.clone()));
            }
            inverse.push((ticker.clone(), 1.0 / vol));
        }

        let total: f64 = inverse.iter().map(|(_, w)| w).sum();
        Ok(inverse
            .into_iter()
            .map(|(ticker, w)| (ticker, w / total))
            .collect())
    }

    /// Fetch each ticker's daily candles through the market data port and
    /// compute weights.
    pub async fn allocate(&self, data: &dyn MarketDataPort) -> Result<HashMap<String, f64>> {
        let mut series = Vec::with_capacity(self.tickers.len());
        for ticker in &self.tickers {
            let candles = data
                .candles(ticker, CandleInterval::Day, self.volatility_window)
                .await?;
            // Port order is newest-first; volatility math wants oldest-first
            let closes: Vec<f64> = candles.iter().rev().map(|c| c.close).collect();
            series.push((ticker.clone(), closes));
        }
        self.weights(&series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn allocator(tickers: &[&str]) -> Result<InverseVolatility> {
        InverseVolatility::from_params(&StrategyParams::new(
            [("tickers".to_string(), json!(tickers))].into_iter().collect(),
        ))
    }

    #[test]
    fn fewer_than_two_tickers_is_invalid() {
        assert!(matches!(
            allocator(&["KRW-BTC"]),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn identical_volatility_gives_equal_weights() {
        let alloc = allocator(&["KRW-BTC", "KRW-ETH", "KRW-XRP"]).unwrap();
        let closes = vec![100.0, 110.0, 100.0, 110.0, 100.0];
        let series: Vec<(String, Vec<f64>)> = ["KRW-BTC", "KRW-ETH", "KRW-XRP"]
            .iter()
            .map(|t| (t.to_string(), closes.clone()))
            .collect();

        let weights = alloc.weights(&series).unwrap();
        let sum: f64 = weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        for weight in weights.values() {
            assert!((weight - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn calmer_ticker_gets_the_larger_weight() {
        let alloc = allocator(&["KRW-BTC", "KRW-ETH"]).unwrap();
        let series = vec![
            ("KRW-BTC".to_string(), vec![100.0, 120.0, 90.0, 130.0, 80.0]),
            ("KRW-ETH".to_string(), vec![100.0, 101.0, 100.0, 101.0, 100.0]),
        ];
        let weights = alloc.weights(&series).unwrap();
        assert!(weights["KRW-ETH"] > weights["KRW-BTC"]);
        assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_volatility_ticker_is_degenerate() {
        let alloc = allocator(&["KRW-BTC", "KRW-ETH"]).unwrap();
        let series = vec![
            ("KRW-BTC".to_string(), vec![100.0, 110.0, 100.0]),
            ("KRW-ETH".to_string(), vec![100.0, 100.0, 100.0]),
        ];
        let err = alloc.weights(&series).unwrap_err();
        assert!(matches!(err, Error::DegenerateVolatility(t) if t == "KRW-ETH"));
    }

    mod port {
        use super::*;
        use async_trait::async_trait;
        use chrono::{Duration, Utc};
        use common::{Candle, CandleInterval};

        /// Serves a fixed close series (newest-first) for every market.
        struct FixedData {
            closes: Vec<f64>,
        }

        #[async_trait]
        impl MarketDataPort for FixedData {
            async fn candles(
                &self,
                _market: &str,
                _interval: CandleInterval,
                count: usize,
            ) -> Result<Vec<Candle>> {
                let now = Utc::now();
                Ok(self
                    .closes
                    .iter()
                    .take(count)
                    .enumerate()
                    .map(|(i, &close)| Candle {
                        open: close,
                        high: close,
                        low: close,
                        close,
                        volume: 1.0,
                        timestamp: now - Duration::days(i as i64),
                    })
                    .collect())
            }
        }

        #[tokio::test]
        async fn allocate_fetches_and_weighs() {
            let alloc = allocator(&["KRW-BTC", "KRW-ETH"]).unwrap();
            let data = FixedData {
                closes: (0..20).map(|i| 100.0 + (i % 2) as f64 * 10.0).collect(),
            };
            let weights = alloc.allocate(&data).await.unwrap();
            assert_eq!(weights.len(), 2);
            assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}
