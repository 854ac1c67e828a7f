pub mod counter_trend;
pub mod inverse_volatility;
pub mod params;
pub mod spread;
pub mod state;
pub mod stats;
pub mod trend_following;

pub use counter_trend::CounterTrend;
pub use inverse_volatility::InverseVolatility;
pub use params::StrategyParams;
pub use spread::Spread;
pub use state::StrategyState;
pub use trend_following::TrendFollowing;

use common::{Candle, CandleInterval, Error, Result, Signal};

/// Candle window a strategy needs per evaluation, declared at construction.
/// The runner fetches one window per ticker and hands all of them to
/// `evaluate` in the same order.
#[derive(Debug, Clone)]
pub struct WindowSpec {
    pub tickers: Vec<String>,
    pub interval: CandleInterval,
    pub count: usize,
}

/// One fetched candle window, newest-first.
#[derive(Debug, Clone)]
pub struct MarketWindow {
    pub market: String,
    pub candles: Vec<Candle>,
}

/// All strategy implementations must satisfy this trait.
pub trait Strategy: Send + std::fmt::Debug {
    /// Strategy kind identifier shown in logs.
    fn name(&self) -> &str;

    /// The candle window this strategy requires each tick.
    fn window(&self) -> &WindowSpec;

    /// Evaluate the delivered candle windows (one per declared ticker,
    /// newest-first) and produce a signal.
    ///
    /// Takes `&mut self`: the EMA and Spread variants carry running state
    /// across evaluations, so the result can depend on call order, not just
    /// the latest window. Fails with `InsufficientData` when any window is
    /// shorter than `window().count` and never partially computes.
    fn evaluate(&mut self, windows: &[MarketWindow]) -> Result<Signal>;
}

/// Build a strategy instance by kind name, validating parameters up front.
///
/// Registration-time errors (`InvalidParameters`) surface here, never per
/// tick. `inverse_volatility` is deliberately rejected: it is a portfolio
/// allocator with its own contract, not a per-market signal strategy.
pub fn build_strategy(
    kind: &str,
    market: &str,
    params: &StrategyParams,
) -> Result<Box<dyn Strategy>> {
    match kind {
        "trend_following" => Ok(Box::new(TrendFollowing::from_params(market, params)?)),
        "counter_trend" => Ok(Box::new(CounterTrend::from_params(market, params)?)),
        "spread" => Ok(Box::new(Spread::from_params(params)?)),
        "inverse_volatility" => Err(Error::InvalidParameters(
            "inverse_volatility is a portfolio allocator, not a per-market strategy".into(),
        )),
        other => Err(Error::InvalidParameters(format!(
            "unknown strategy '{other}'"
        ))),
    }
}

/// Bail out with `InsufficientData` unless every window covers `count`
/// candles. Returns the windows truncated to exactly `count` each.
pub(crate) fn checked_windows<'a>(
    windows: &'a [MarketWindow],
    count: usize,
    expected: usize,
) -> Result<Vec<&'a [Candle]>> {
    if windows.len() < expected {
        return Err(Error::InsufficientData {
            required: count,
            got: 0,
        });
    }
    windows[..expected]
        .iter()
        .map(|w| {
            if w.candles.len() < count {
                Err(Error::InsufficientData {
                    required: count,
                    got: w.candles.len(),
                })
            } else {
                Ok(&w.candles[..count])
            }
        })
        .collect()
}
