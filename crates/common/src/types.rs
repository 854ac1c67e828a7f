use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar as returned by the market data port.
///
/// Candle sequences are always ordered NEWEST-FIRST — index 0 is the most
/// recent (possibly still-forming) candle, matching Upbit's wire order.
/// Every window computation in `crates/strategy` is written against that
/// convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

/// Candle bucket size requested from the market data port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleInterval {
    Day,
    /// Minute candles with the given unit (1, 3, 5, 15, 30, 60, 240).
    Minute(u32),
}

impl std::fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandleInterval::Day => write!(f, "days"),
            CandleInterval::Minute(unit) => write!(f, "minutes/{unit}"),
        }
    }
}

/// Trade recommendation produced by one strategy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
    Long,
    Short,
}

impl SignalKind {
    /// Order side this signal translates to. `Hold` places no order.
    pub fn order_side(&self) -> Option<OrderSide> {
        match self {
            SignalKind::Buy | SignalKind::Long => Some(OrderSide::Buy),
            SignalKind::Sell | SignalKind::Short => Some(OrderSide::Sell),
            SignalKind::Hold => None,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "buy"),
            SignalKind::Sell => write!(f, "sell"),
            SignalKind::Hold => write!(f, "hold"),
            SignalKind::Long => write!(f, "long"),
            SignalKind::Short => write!(f, "short"),
        }
    }
}

/// Signal emitted by a strategy for the current tick. Produced fresh on every
/// evaluation and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    /// Price the signal was computed against (latest close).
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// Indicator name → value pairs backing the decision.
    #[serde(default)]
    pub indicators: HashMap<String, f64>,
}

impl Signal {
    pub fn new(kind: SignalKind, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            price,
            timestamp,
            indicators: HashMap::new(),
        }
    }

    pub fn hold(price: f64, timestamp: DateTime<Utc>) -> Self {
        Self::new(SignalKind::Hold, price, timestamp)
    }

    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }
}

/// Side of an order sent to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// How a market order is sized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSizing {
    /// Spend the full available quote balance (buys).
    FullBalance,
    /// Trade a fixed quantity of the base asset (sells sized by held balance).
    Amount(f64),
}

/// Confirmation of a filled order returned by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub id: String,
    pub filled_amount: f64,
    pub filled_price: f64,
}

/// Whether orders go to the real exchange or the paper simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// Base asset of an Upbit market code ("KRW-BTC" → "BTC").
pub fn base_asset(market: &str) -> &str {
    market.split_once('-').map(|(_, base)| base).unwrap_or(market)
}

/// Quote asset of an Upbit market code ("KRW-BTC" → "KRW").
pub fn quote_asset(market: &str) -> &str {
    market.split_once('-').map(|(quote, _)| quote).unwrap_or(market)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_kind_maps_to_order_side() {
        assert_eq!(SignalKind::Buy.order_side(), Some(OrderSide::Buy));
        assert_eq!(SignalKind::Long.order_side(), Some(OrderSide::Buy));
        assert_eq!(SignalKind::Sell.order_side(), Some(OrderSide::Sell));
        assert_eq!(SignalKind::Short.order_side(), Some(OrderSide::Sell));
        assert_eq!(SignalKind::Hold.order_side(), None);
    }

    #[test]
    fn market_code_splits_into_assets() {
        assert_eq!(base_asset("KRW-BTC"), "BTC");
        assert_eq!(quote_asset("KRW-BTC"), "KRW");
        // A code without a separator falls through unchanged
        assert_eq!(base_asset("BTC"), "BTC");
    }
}
