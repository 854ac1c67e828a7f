use common::{CandleInterval, Error, Result, Signal, SignalKind};

use crate::params::StrategyParams;
use crate::stats::mean;
use crate::{checked_windows, MarketWindow, Strategy, WindowSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrendType {
    Breakout,
    Sma,
    Ema,
}

/// Trend-following over daily candles, in one of three sub-modes.
///
/// `breakout` trades prior-N-day high/low breaks, `sma` compares short/long
/// simple means, `ema` maintains running exponential means across calls.
/// The newest candle is excluded from all lookback computations: it is the
/// still-forming bar whose close is the "current price".
#[derive(Debug)]
pub struct TrendFollowing {
    window: WindowSpec,
    trend_type: TrendType,
    short_window: usize,
    long_window: usize,
    alpha: f64,
    // Running EMA state, seeded lazily from the first window's simple means.
    // Persists for the life of the instance; a fresh registration starts over.
    prev_short_ema: Option<f64>,
    prev_long_ema: Option<f64>,
}

impl TrendFollowing {
    pub fn from_params(market: &str, params: &StrategyParams) -> Result<Self> {
        let tickers = params.tickers_or(&[market])?;
        let trend_type = match params.str_or("trendType", "sma")?.as_str() {
            "breakout" => TrendType::Breakout,
            "sma" => TrendType::Sma,
            "ema" => TrendType::Ema,
            other => {
                return Err(Error::InvalidParameters(format!(
                    "'trendType' must be breakout, sma or ema, got '{other}'"
                )))
            }
        };

        let n_days = params.usize_or("nDays", 20)?;
        let short_window = params.usize_or("shortPeriod", 20)?;
        let long_window = params.usize_or("longPeriod", 50)?;
        let alpha = params.f64_or("alpha", 0.1)?;

        match trend_type {
            TrendType::Breakout => {
                if n_days == 0 {
                    return Err(Error::InvalidParameters("'nDays' must be at least 1".into()));
                }
            }
            TrendType::Sma | TrendType::Ema => {
                if short_window == 0 || long_window < short_window {
                    return Err(Error::InvalidParameters(
                        "'shortPeriod' must be >= 1 and 'longPeriod' >= 'shortPeriod'".into(),
                    ));
                }
                if !(alpha > 0.0 && alpha <= 1.0) {
                    return Err(Error::InvalidParameters(format!(
                        "'alpha' must be in (0, 1], got {alpha}"
                    )));
                }
            }
        }

        let count = match trend_type {
            TrendType::Breakout => n_days + 1,
            TrendType::Sma | TrendType::Ema => long_window + 1,
        };

        Ok(Self {
            window: WindowSpec {
                tickers: vec![tickers[0].clone()],
                interval: CandleInterval::Day,
                count,
            },
            trend_type,
            short_window,
            long_window,
            alpha,
            prev_short_ema: None,
            prev_long_ema: None,
        })
    }

    fn evaluate_breakout(&self, candles: &[common::Candle]) -> Signal {
        let prior = &candles[1..];
        let prev_high = prior.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let prev_low = prior.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let current = candles[0].close;

        let kind = if current >= prev_high {
            SignalKind::Buy
        } else if current <= prev_low {
            SignalKind::Sell
        } else {
            SignalKind::Hold
        };

        Signal::new(kind, current, candles[0].timestamp)
            .with_indicator("breakout_high", prev_high)
            .with_indicator("breakout_low", prev_low)
    }

    fn evaluate_sma(&self, candles: &[common::Candle]) -> Signal {
        // Closes of the lookback set, newest-first, newest candle excluded
        let closes: Vec<f64> = candles[1..].iter().map(|c| c.close).collect();
        let short_sma = mean(&closes[..self.short_window]);
        let long_sma = mean(&closes[..self.long_window]);

        // Strict comparison: equal means resolve to Short
        let kind = if short_sma > long_sma {
            SignalKind::Long
        } else {
            SignalKind::Short
        };

        Signal::new(kind, candles[0].close, candles[0].timestamp)
            .with_indicator("short_sma", short_sma)
            .with_indicator("long_sma", long_sma)
    }

    fn evaluate_ema(&mut self, candles: &[common::Candle]) -> Signal {
        let closes: Vec<f64> = candles[1..].iter().map(|c| c.close).collect();

        let prev_short = *self
            .prev_short_ema
            .get_or_insert_with(|| mean(&closes[..self.short_window]));
        let prev_long = *self
            .prev_long_ema
            .get_or_insert_with(|| mean(&closes[..self.long_window]));

        let latest = closes[0];
        let short_ema = (latest - prev_short) * self.alpha + prev_short;
        let long_ema = (latest - prev_long) * self.alpha + prev_long;
        self.prev_short_ema = Some(short_ema);
        self.prev_long_ema = Some(long_ema);

        let kind = if short_ema > long_ema {
            SignalKind::Buy
        } else {
            SignalKind::Sell
        };

        Signal::new(kind, candles[0].close, candles[0].timestamp)
            .with_indicator("short_ema", short_ema)
            .with_indicator("long_ema", long_ema)
    }
}

impl Strategy for TrendFollowing {
    fn name(&self) -> &str {
        "trend_following"
    }

    fn window(&self) -> &WindowSpec {
        &self.window
    }

    fn evaluate(&mut self, windows: &[MarketWindow]) -> Result<Signal> {
        let candles = checked_windows(windows, self.window.count, 1)?[0];
        Ok(match self.trend_type {
            TrendType::Breakout => self.evaluate_breakout(candles),
            TrendType::Sma => self.evaluate_sma(candles),
            TrendType::Ema => self.evaluate_ema(candles),
        })
    }
}
