use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    base_asset, quote_asset, BrokerPort, CandleInterval, Error, MarketDataPort, OrderResult,
    OrderSide, OrderSizing, Result,
};

/// Simulated broker for paper trading.
///
/// Fills are simulated at the latest minute-candle close from the market
/// data port, with configurable slippage. Balances live in an in-memory
/// ledger seeded with a KRW stake. No real orders are ever sent.
pub struct PaperBroker {
    data: Arc<dyn MarketDataPort>,
    /// Asset → available amount.
    balances: RwLock<HashMap<String, f64>>,
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
}

impl PaperBroker {
    pub fn new(data: Arc<dyn MarketDataPort>, initial_krw: f64, slippage_bps: f64) -> Self {
        info!(
            balance = initial_krw,
            slippage_bps = slippage_bps,
            "PaperBroker initialized"
        );
        let mut balances = HashMap::new();
        balances.insert("KRW".to_string(), initial_krw);
        Self {
            data,
            balances: RwLock::new(balances),
            slippage_bps,
        }
    }

    /// Latest traded price, read from the freshest minute candle.
    async fn latest_price(&self, market: &str) -> Result<f64> {
        let candles = self
            .data
            .candles(market, CandleInterval::Minute(1), 1)
            .await?;
        candles
            .first()
            .map(|c| c.close)
            .ok_or_else(|| Error::DataUnavailable(format!("no price available for {market}")))
    }
}

#[async_trait]
impl BrokerPort for PaperBroker {
    async fn place_order(
        &self,
        market: &str,
        side: OrderSide,
        sizing: OrderSizing,
    ) -> Result<OrderResult> {
        let mid = self.latest_price(market).await?;

        // Slippage: buys pay more, sells receive less
        let fill_price = match side {
            OrderSide::Buy => mid * (1.0 + self.slippage_bps / 10_000.0),
            OrderSide::Sell => mid * (1.0 - self.slippage_bps / 10_000.0),
        };

        let quote = quote_asset(market).to_string();
        let base = base_asset(market).to_string();
        let mut balances = self.balances.write().await;

        let result = match side {
            OrderSide::Buy => {
                let available = balances.get(&quote).copied().unwrap_or(0.0);
                let spend = match sizing {
                    OrderSizing::FullBalance => available,
                    OrderSizing::Amount(amount) => amount,
                };
                if spend <= 0.0 || spend > available {
                    return Err(Error::Broker {
                        status: 400,
                        message: format!("insufficient {quote} balance for buy of {spend}"),
                    });
                }
                let quantity = spend / fill_price;
                *balances.entry(quote).or_insert(0.0) -= spend;
                *balances.entry(base).or_insert(0.0) += quantity;
                OrderResult {
                    id: uuid::Uuid::new_v4().to_string(),
                    filled_amount: quantity,
                    filled_price: fill_price,
                }
            }
            OrderSide::Sell => {
                let held = balances.get(&base).copied().unwrap_or(0.0);
                let volume = match sizing {
                    OrderSizing::FullBalance => held,
                    OrderSizing::Amount(amount) => amount,
                };
                if volume <= 0.0 || volume > held {
                    return Err(Error::Broker {
                        status: 400,
                        message: format!("insufficient {base} balance for sell of {volume}"),
                    });
                }
                *balances.entry(base).or_insert(0.0) -= volume;
                *balances.entry(quote).or_insert(0.0) += volume * fill_price;
                OrderResult {
                    id: uuid::Uuid::new_v4().to_string(),
                    filled_amount: volume,
                    filled_price: fill_price,
                }
            }
        };

        debug!(
            market = %market,
            side = ?side,
            mid = mid,
            fill = result.filled_price,
            amount = result.filled_amount,
            "Paper fill simulated"
        );
        Ok(result)
    }

    async fn balance(&self, asset: &str) -> Result<f64> {
        Ok(self.balances.read().await.get(asset).copied().unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::Candle;

    /// Always serves one candle at a fixed price.
    struct FixedPrice(f64);

    #[async_trait]
    impl MarketDataPort for FixedPrice {
        async fn candles(
            &self,
            _market: &str,
            _interval: CandleInterval,
            _count: usize,
        ) -> Result<Vec<Candle>> {
            Ok(vec![Candle {
                open: self.0,
                high: self.0,
                low: self.0,
                close: self.0,
                volume: 1.0,
                timestamp: Utc::now(),
            }])
        }
    }

    fn broker(price: f64, krw: f64, slippage_bps: f64) -> PaperBroker {
        PaperBroker::new(Arc::new(FixedPrice(price)), krw, slippage_bps)
    }

    #[tokio::test]
    async fn buy_fill_applies_positive_slippage() {
        let broker = broker(1000.0, 10_000.0, 10.0); // 10 bps
        let fill = broker
            .place_order("KRW-BTC", OrderSide::Buy, OrderSizing::FullBalance)
            .await
            .unwrap();

        let expected = 1000.0 * (1.0 + 10.0 / 10_000.0);
        assert!(
            (fill.filled_price - expected).abs() < 1e-6,
            "Buy fill price {}, expected {}",
            fill.filled_price,
            expected
        );
    }

    #[tokio::test]
    async fn sell_fill_applies_negative_slippage() {
        let broker = broker(1000.0, 10_000.0, 10.0);
        broker
            .place_order("KRW-BTC", OrderSide::Buy, OrderSizing::FullBalance)
            .await
            .unwrap();

        let held = broker.balance("BTC").await.unwrap();
        let fill = broker
            .place_order("KRW-BTC", OrderSide::Sell, OrderSizing::Amount(held))
            .await
            .unwrap();

        let expected = 1000.0 * (1.0 - 10.0 / 10_000.0);
        assert!(
            (fill.filled_price - expected).abs() < 1e-6,
            "Sell fill price {}, expected {}",
            fill.filled_price,
            expected
        );
    }

    #[tokio::test]
    async fn full_balance_buy_moves_the_whole_stake() {
        let broker = broker(500.0, 10_000.0, 0.0);
        let fill = broker
            .place_order("KRW-ETH", OrderSide::Buy, OrderSizing::FullBalance)
            .await
            .unwrap();

        assert!((fill.filled_amount - 20.0).abs() < 1e-9);
        assert_eq!(broker.balance("KRW").await.unwrap(), 0.0);
        assert!((broker.balance("ETH").await.unwrap() - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn sell_restores_the_quote_balance() {
        let broker = broker(500.0, 10_000.0, 0.0);
        broker
            .place_order("KRW-ETH", OrderSide::Buy, OrderSizing::FullBalance)
            .await
            .unwrap();
        broker
            .place_order("KRW-ETH", OrderSide::Sell, OrderSizing::FullBalance)
            .await
            .unwrap();

        assert!((broker.balance("KRW").await.unwrap() - 10_000.0).abs() < 1e-6);
        assert_eq!(broker.balance("ETH").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn overselling_is_rejected() {
        let broker = broker(500.0, 10_000.0, 0.0);
        let err = broker
            .place_order("KRW-ETH", OrderSide::Sell, OrderSizing::Amount(1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Broker { status: 400, .. }));
    }

    #[tokio::test]
    async fn unknown_asset_balance_is_zero() {
        let broker = broker(500.0, 10_000.0, 0.0);
        assert_eq!(broker.balance("DOGE").await.unwrap(), 0.0);
    }
}
