use common::{CandleInterval, Error, Result, Signal, SignalKind};

use crate::params::StrategyParams;
use crate::stats::mean;
use crate::{checked_windows, MarketWindow, Strategy, WindowSpec};

/// Mean-reversion on daily ranges.
///
/// The average daily range over the prior N days (excluding the two newest
/// candles) is projected from the second-newest candle's high and low. A
/// close far enough below the high is expected to revert up (Long), far
/// enough above the low to revert down (Short). Both boundaries are
/// non-inclusive: a close exactly on a hit level holds.
#[derive(Debug)]
pub struct CounterTrend {
    window: WindowSpec,
    k_value: f64,
}

impl CounterTrend {
    pub fn from_params(market: &str, params: &StrategyParams) -> Result<Self> {
        let tickers = params.tickers_or(&[market])?;
        let k_value = params.f64_or("kValue", 2.2)?;
        let n_days = params.usize_or("nDays", 20)?;
        if n_days == 0 {
            return Err(Error::InvalidParameters("'nDays' must be at least 1".into()));
        }
        if k_value < 0.0 {
            return Err(Error::InvalidParameters(format!(
                "'kValue' must be non-negative, got {k_value}"
            )));
        }

        Ok(Self {
            window: WindowSpec {
                tickers: vec![tickers[0].clone()],
                interval: CandleInterval::Day,
                count: n_days + 2,
            },
            k_value,
        })
    }
}

impl Strategy for CounterTrend {
    fn name(&self) -> &str {
        "counter_trend"
    }

    fn window(&self) -> &WindowSpec {
        &self.window
    }

    fn evaluate(&mut self, windows: &[MarketWindow]) -> Result<Signal> {
        let candles = checked_windows(windows, self.window.count, 1)?[0];

        // Average daily range over the N days before the two newest candles.
        // A flat market gives avg_range = 0 and the hit levels collapse onto
        // the previous high/low; nothing here divides.
        let ranges: Vec<f64> = candles[2..].iter().map(|c| c.high - c.low).collect();
        let avg_range = mean(&ranges);

        let prev = &candles[1];
        let long_hit_level = prev.high - self.k_value * avg_range;
        let short_hit_level = prev.low + self.k_value * avg_range;
        let current = candles[0].close;

        let kind = if current < long_hit_level {
            SignalKind::Long
        } else if current > short_hit_level {
            SignalKind::Short
        } else {
            SignalKind::Hold
        };

        Ok(Signal::new(kind, current, candles[0].timestamp)
            .with_indicator("avg_range", avg_range)
            .with_indicator("long_hit_level", long_hit_level)
            .with_indicator("short_hit_level", short_hit_level))
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

    /// Newest-first window from (high, low, close) triples.
    fn window_of(bars: &[(f64, f64, f64)]) -> Vec<MarketWindow> {
        let now = Utc::now();
        let candles = bars
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close))| Candle {
                open: close,
                high,
                low,
                close,
                volume: 1.0,
                timestamp: now - Duration::days(i as i64),
            })
            .collect();
        vec![MarketWindow {
            market: "KRW-BTC".into(),
            candles,
        }]
    }

    fn strategy(n_days: u64, k: f64) -> CounterTrend {
        CounterTrend::from_params(
            "KRW-BTC",
            &params(&[("nDays", json!(n_days)), ("kValue", json!(k))]),
        )
        .unwrap()
    }

    #[test]
    fn insufficient_history_fails() {
        let mut s = strategy(3, 2.0);
        let err = s
            .evaluate(&window_of(&[(10.0, 9.0, 9.5); 4]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData { required: 5, got: 4 }
        ));
    }

    #[test]
    fn deep_drop_below_long_hit_goes_long() {
        let mut s = strategy(2, 1.0);
        // Ranges: (110-90)=20, (105-95)=10 → avg 15; prev high 100
        // long_hit = 100 - 15 = 85; close 80 < 85 → Long
        let signal = s
            .evaluate(&window_of(&[
                (81.0, 79.0, 80.0),
                (100.0, 96.0, 98.0),
                (110.0, 90.0, 100.0),
                (105.0, 95.0, 100.0),
            ]))
            .unwrap();
        assert_eq!(signal.kind, SignalKind::Long);
        assert_eq!(signal.indicators["long_hit_level"], 85.0);
    }

    #[test]
    fn spike_above_short_hit_goes_short() {
        let mut s = strategy(2, 1.0);
        // prev low 96; short_hit = 96 + 15 = 111; close 112 > 111 → Short
        let signal = s
            .evaluate(&window_of(&[
                (113.0, 110.0, 112.0),
                (100.0, 96.0, 98.0),
                (110.0, 90.0, 100.0),
                (105.0, 95.0, 100.0),
            ]))
            .unwrap();
        assert_eq!(signal.kind, SignalKind::Short);
        assert_eq!(signal.indicators["short_hit_level"], 111.0);
    }

    #[test]
    fn flat_market_hit_levels_equal_prev_high_low() {
        let mut s = strategy(3, 2.2);
        // Every bar identical: avg_range = 0, so the levels collapse onto the
        // previous candle's high/low and the close (on the boundary) holds
        let signal = s
            .evaluate(&window_of(&[(100.0, 100.0, 100.0); 5]))
            .unwrap();
        assert_eq!(signal.kind, SignalKind::Hold);
        assert_eq!(signal.indicators["long_hit_level"], 100.0);
        assert_eq!(signal.indicators["short_hit_level"], 100.0);
    }

    #[test]
    fn close_exactly_on_hit_level_holds() {
        let mut s = strategy(2, 1.0);
        // long_hit = 85 exactly; non-inclusive boundary → Hold
        let signal = s
            .evaluate(&window_of(&[
                (86.0, 84.0, 85.0),
                (100.0, 96.0, 98.0),
                (110.0, 90.0, 100.0),
                (105.0, 95.0, 100.0),
            ]))
            .unwrap();
        assert_eq!(signal.kind, SignalKind::Hold);
    }
}
