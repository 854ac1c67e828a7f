use common::{CandleInterval, Error, Result, Signal, SignalKind};

use crate::params::StrategyParams;
use crate::stats::{pct_changes, z_scores};
use crate::{checked_windows, MarketWindow, Strategy, WindowSpec};

/// Pair trade over two tickers.
///
/// Each leg's day-over-day return series (newest candle excluded) is
/// standardized, and the latest z-score of each leg drives entry: the first
/// leg stretched low while the second is stretched high enters Long, the
/// mirror image enters Short. An open entry is held for `holdingPeriod`
/// further evaluations, then closed with a single exit signal (Sell after a
/// Long entry, Buy after a Short entry).
#[derive(Debug)]
pub struct Spread {
    window: WindowSpec,
    long_entry: f64,
    short_entry: f64,
    holding_period: usize,
    /// Outstanding entry and the number of evaluations since it was emitted.
    entry: Option<(SignalKind, usize)>,
}

impl Spread {
    pub fn from_params(params: &StrategyParams) -> Result<Self> {
        let tickers = params.required_tickers()?;
        if tickers.len() != 2 {
            return Err(Error::InvalidParameters(format!(
                "spread requires exactly 2 tickers, got {}",
                tickers.len()
            )));
        }
        let long_entry = params.f64_or("longEntryThreshold", -1.0)?;
        let short_entry = params.f64_or("shortEntryThreshold", 1.0)?;
        let lookback = params.usize_or("lookbackDays", 20)?;
        let holding_period = params.usize_or("holdingPeriod", 5)?;
        if lookback < 2 {
            return Err(Error::InvalidParameters(
                "'lookbackDays' must be at least 2".into(),
            ));
        }
        if holding_period == 0 {
            return Err(Error::InvalidParameters(
                "'holdingPeriod' must be at least 1".into(),
            ));
        }

        Ok(Self {
            window: WindowSpec {
                tickers,
                interval: CandleInterval::Day,
                // lookback + 1 closes after dropping the newest candle
                count: lookback + 2,
            },
            long_entry,
            short_entry,
            holding_period,
            entry: None,
        })
    }

    /// Latest z-score of a leg's return series. The window is newest-first;
    /// returns are computed oldest-first so the last z is the most recent.
    fn latest_z(&self, ticker: &str, candles: &[common::Candle]) -> Result<f64> {
        let mut closes: Vec<f64> = candles[1..].iter().map(|c| c.close).collect();
        closes.reverse();
        let returns = pct_changes(&closes);
        let z = z_scores(&returns)
            .ok_or_else(|| Error::DegenerateVolatility(ticker.to_string()))?;
        Ok(*z.last().expect("lookback >= 2 guarantees a non-empty series"))
    }
}

impl Strategy for Spread {
    fn name(&self) -> &str {
        "spread"
    }

    fn window(&self) -> &WindowSpec {
        &self.window
    }

    fn evaluate(&mut self, windows: &[MarketWindow]) -> Result<Signal> {
        let legs = checked_windows(windows, self.window.count, 2)?;
        let price = legs[0][0].close;
        let timestamp = legs[0][0].timestamp;

        // Holding-period bookkeeping runs before any z computation so an
        // open entry always closes on schedule, even through a degenerate
        // data patch.
        if let Some((kind, ticks)) = self.entry {
            let ticks = ticks + 1;
            if ticks >= self.holding_period {
                self.entry = None;
                let exit = match kind {
                    SignalKind::Long => SignalKind::Sell,
                    _ => SignalKind::Buy,
                };
                return Ok(Signal::new(exit, price, timestamp));
            }
            self.entry = Some((kind, ticks));
            return Ok(Signal::hold(price, timestamp));
        }

        let z1 = self.latest_z(&self.window.tickers[0], legs[0])?;
        let z2 = self.latest_z(&self.window.tickers[1], legs[1])?;

        let kind = if z1 <= self.long_entry && z2 >= self.short_entry {
            SignalKind::Long
        } else if z1 >= self.short_entry && z2 <= self.long_entry {
            SignalKind::Short
        } else {
            SignalKind::Hold
        };

        if matches!(kind, SignalKind::Long | SignalKind::Short) {
            self.entry = Some((kind, 0));
        }

        Ok(Signal::new(kind, price, timestamp)
            .with_indicator(format!("z_{}", self.window.tickers[0]), z1)
            .with_indicator(format!("z_{}", self.window.tickers[1]), z2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::Candle;
    use serde_json::json;
    use std::collections::HashMap;

    fn params(pairs: &[(&str, serde_json::Value)]) -> StrategyParams {
        StrategyParams::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn strategy(lookback: u64, holding: u64) -> Spread {
        Spread::from_params(&params(&[
            ("tickers", json!(["KRW-BTC", "KRW-ETH"])),
            ("lookbackDays", json!(lookback)),
            ("holdingPeriod", json!(holding)),
        ]))
        .unwrap()
    }

    /// Build one leg's newest-first window from OLDEST-FIRST closes plus the
    /// current (newest, excluded) close.
    fn leg(market: &str, oldest_first: &[f64], current: f64) -> MarketWindow {
        let now = Utc::now();
        let mut closes: Vec<f64> = oldest_first.to_vec();
        closes.reverse();
        closes.insert(0, current);
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
                timestamp: now - Duration::days(i as i64),
            })
            .collect();
        MarketWindow {
            market: market.into(),
            candles,
        }
    }

    fn diverging_legs() -> Vec<MarketWindow> {
        // Leg 1 collapses on its latest day, leg 2 spikes: z1 ≈ -1.7, z2 ≈ +1.7
        vec![
            leg("KRW-BTC", &[100.0, 101.0, 100.0, 101.0, 80.0], 80.0),
            leg("KRW-ETH", &[100.0, 99.0, 100.0, 99.0, 120.0], 120.0),
        ]
    }

    fn neutral_legs() -> Vec<MarketWindow> {
        vec![
            leg("KRW-BTC", &[100.0, 100.0, 101.0, 100.0, 101.0], 101.0),
            leg("KRW-ETH", &[100.0, 100.0, 101.0, 100.0, 101.0], 101.0),
        ]
    }

    #[test]
    fn requires_exactly_two_tickers() {
        let err = Spread::from_params(&params(&[("tickers", json!(["KRW-BTC"]))])).unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
        let err =
            Spread::from_params(&params(&[("tickers", json!([]))])).unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[test]
    fn missing_leg_fails_with_insufficient_data() {
        let mut s = strategy(4, 5);
        let one_leg = vec![leg("KRW-BTC", &[100.0, 101.0, 100.0, 101.0, 80.0], 80.0)];
        assert!(matches!(
            s.evaluate(&one_leg).unwrap_err(),
            Error::InsufficientData { .. }
        ));
    }

    #[test]
    fn short_candle_window_fails_with_insufficient_data() {
        let mut s = strategy(4, 5);
        let legs = vec![
            leg("KRW-BTC", &[100.0, 101.0, 100.0], 80.0),
            leg("KRW-ETH", &[100.0, 99.0, 100.0], 120.0),
        ];
        assert!(matches!(
            s.evaluate(&legs).unwrap_err(),
            Error::InsufficientData { required: 6, got: 4 }
        ));
    }

    #[test]
    fn diverged_legs_enter_long() {
        let mut s = strategy(4, 5);
        let signal = s.evaluate(&diverging_legs()).unwrap();
        assert_eq!(signal.kind, SignalKind::Long);
        assert!(signal.indicators["z_KRW-BTC"] <= -1.0);
        assert!(signal.indicators["z_KRW-ETH"] >= 1.0);
    }

    #[test]
    fn mirrored_divergence_enters_short() {
        let mut s = strategy(4, 5);
        let legs = vec![
            leg("KRW-BTC", &[100.0, 99.0, 100.0, 99.0, 120.0], 120.0),
            leg("KRW-ETH", &[100.0, 101.0, 100.0, 101.0, 80.0], 80.0),
        ];
        let signal = s.evaluate(&legs).unwrap();
        assert_eq!(signal.kind, SignalKind::Short);
    }

    #[test]
    fn neutral_zscores_hold() {
        let mut s = strategy(4, 5);
        let signal = s.evaluate(&neutral_legs()).unwrap();
        assert_eq!(signal.kind, SignalKind::Hold);
    }

    #[test]
    fn flat_leg_is_degenerate() {
        let mut s = strategy(4, 5);
        let legs = vec![
            leg("KRW-BTC", &[100.0; 5], 100.0),
            leg("KRW-ETH", &[100.0, 99.0, 100.0, 99.0, 120.0], 120.0),
        ];
        let err = s.evaluate(&legs).unwrap_err();
        assert!(matches!(err, Error::DegenerateVolatility(t) if t == "KRW-BTC"));
    }

    #[test]
    fn holding_period_forces_one_exit_signal() {
        let mut s = strategy(4, 2);

        // Entry
        assert_eq!(s.evaluate(&diverging_legs()).unwrap().kind, SignalKind::Long);
        // Still holding: one evaluation elapsed of the two allowed
        assert_eq!(s.evaluate(&neutral_legs()).unwrap().kind, SignalKind::Hold);
        // Holding period reached: forced exit, opposite side of the entry
        assert_eq!(s.evaluate(&neutral_legs()).unwrap().kind, SignalKind::Sell);
        // Entry cleared; neutral data is a plain Hold again
        assert_eq!(s.evaluate(&neutral_legs()).unwrap().kind, SignalKind::Hold);
    }
}
