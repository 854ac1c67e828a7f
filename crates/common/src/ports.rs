use async_trait::async_trait;

use crate::{Candle, CandleInterval, OrderResult, OrderSide, OrderSizing, Result};

/// Abstraction over the exchange's market data API.
///
/// `UpbitClient` in `crates/engine` implements this for the real exchange.
/// Returned candles are freshly fetched on every call and ordered
/// NEWEST-FIRST (index 0 is the most recent candle).
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Fetch the most recent `count` candles for a market.
    /// Fails with `DataUnavailable` on transport or upstream errors.
    async fn candles(
        &self,
        market: &str,
        interval: CandleInterval,
        count: usize,
    ) -> Result<Vec<Candle>>;
}

/// Abstraction over order execution and account state.
///
/// `UpbitClient` implements this for live trading, `PaperBroker` in
/// `crates/paper` for simulation. Only the strategy runner submits orders.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Place a market order and return the fill confirmation.
    /// Fails with `Broker` carrying the upstream status.
    async fn place_order(
        &self,
        market: &str,
        side: OrderSide,
        sizing: OrderSizing,
    ) -> Result<OrderResult>;

    /// Current available balance for an asset (e.g. "KRW", "BTC").
    async fn balance(&self, asset: &str) -> Result<f64>;
}
