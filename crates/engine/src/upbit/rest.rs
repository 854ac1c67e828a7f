use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256, Sha512};
use tracing::debug;

use common::{
    base_asset, quote_asset, BrokerPort, Candle, CandleInterval, Error, MarketDataPort,
    OrderResult, OrderSide, OrderSizing, Result,
};

const BASE_URL: &str = "https://api.upbit.com";

/// REST client for the Upbit exchange. Implements both ports: public candle
/// queries for market data, JWT-signed account and order calls for broking.
pub struct UpbitClient {
    access_key: String,
    secret_key: String,
    http: Client,
}

impl UpbitClient {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Build the `Authorization` value for a signed call: a JWT (HS256) over
    /// the access key, a fresh nonce, and, when the request carries
    /// parameters, the SHA-512 hash of the exact query string sent.
    fn auth_header(&self, query: Option<&str>) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);

        let mut claims = json!({
            "access_key": self.access_key,
            "nonce": uuid::Uuid::new_v4().to_string(),
        });
        if let Some(query) = query {
            let mut hasher = Sha512::new();
            hasher.update(query.as_bytes());
            claims["query_hash"] = json!(hex::encode(hasher.finalize()));
            claims["query_hash_alg"] = json!("SHA512");
        }
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

        let signing_input = format!("{header}.{payload}");
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("Bearer {signing_input}.{signature}")
    }

    async fn public_get(&self, path: &str, query: &str) -> Result<String> {
        let url = format!("{BASE_URL}{path}?{query}");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::DataUnavailable(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::DataUnavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::DataUnavailable(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    async fn signed_get(&self, path: &str, query: Option<&str>) -> Result<String> {
        let url = match query {
            Some(q) => format!("{BASE_URL}{path}?{q}"),
            None => format!("{BASE_URL}{path}"),
        };
        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header(query))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Broker {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(body)
    }

    async fn signed_post(&self, path: &str, query: &str) -> Result<String> {
        let url = format!("{BASE_URL}{path}");
        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header(Some(query)))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(query.to_string())
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Broker {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(body)
    }

    async fn asset_balance(&self, asset: &str) -> Result<f64> {
        let body = self.signed_get("/v1/accounts", None).await?;
        let accounts: Vec<Account> =
            serde_json::from_str(&body).map_err(|e| Error::Broker {
                status: 0,
                message: e.to_string(),
            })?;
        Ok(accounts
            .iter()
            .find(|a| a.currency == asset)
            .and_then(|a| a.balance.parse::<f64>().ok())
            .unwrap_or(0.0))
    }
}

#[async_trait]
impl MarketDataPort for UpbitClient {
    async fn candles(
        &self,
        market: &str,
        interval: CandleInterval,
        count: usize,
    ) -> Result<Vec<Candle>> {
        let path = match interval {
            CandleInterval::Day => "/v1/candles/days".to_string(),
            CandleInterval::Minute(unit) => format!("/v1/candles/minutes/{unit}"),
        };
        let query = format!("market={market}&count={count}");
        let body = self.public_get(&path, &query).await?;
        parse_candles(&body)
    }
}

#[async_trait]
impl BrokerPort for UpbitClient {
    async fn place_order(
        &self,
        market: &str,
        side: OrderSide,
        sizing: OrderSizing,
    ) -> Result<OrderResult> {
        // Upbit market orders: buys spend a quote amount (`ord_type=price`),
        // sells trade a base volume (`ord_type=market`).
        let query = match (side, sizing) {
            (OrderSide::Buy, OrderSizing::FullBalance) => {
                let krw = self.asset_balance(quote_asset(market)).await?;
                format!("market={market}&ord_type=price&price={krw}&side=bid")
            }
            (OrderSide::Buy, OrderSizing::Amount(amount)) => {
                format!("market={market}&ord_type=price&price={amount}&side=bid")
            }
            (OrderSide::Sell, OrderSizing::Amount(volume)) => {
                format!("market={market}&ord_type=market&side=ask&volume={volume}")
            }
            (OrderSide::Sell, OrderSizing::FullBalance) => {
                let held = self.asset_balance(base_asset(market)).await?;
                format!("market={market}&ord_type=market&side=ask&volume={held}")
            }
        };

        debug!(market = %market, side = %side, "Submitting order to Upbit");
        let body = self.signed_post("/v1/orders", &query).await?;
        let resp: OrderResponse = serde_json::from_str(&body).map_err(|e| Error::Broker {
            status: 0,
            message: e.to_string(),
        })?;

        Ok(OrderResult {
            id: resp.uuid,
            filled_amount: resp
                .executed_volume
                .or(resp.volume)
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0),
            filled_price: resp
                .price
                .and_then(|p| p.parse::<f64>().ok())
                .unwrap_or(0.0),
        })
    }

    async fn balance(&self, asset: &str) -> Result<f64> {
        self.asset_balance(asset).await
    }
}

// ─── Upbit JSON parsing ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct UpbitCandle {
    opening_price: f64,
    high_price: f64,
    low_price: f64,
    trade_price: f64,
    candle_acc_trade_volume: f64,
    /// Millisecond epoch of the last tick in the candle.
    timestamp: i64,
}

fn parse_candles(body: &str) -> Result<Vec<Candle>> {
    let raw: Vec<UpbitCandle> =
        serde_json::from_str(body).map_err(|e| Error::DataUnavailable(e.to_string()))?;
    Ok(raw
        .into_iter()
        .map(|c| {
            let timestamp: DateTime<Utc> = Utc
                .timestamp_millis_opt(c.timestamp)
                .single()
                .unwrap_or_else(Utc::now);
            Candle {
                open: c.opening_price,
                high: c.high_price,
                low: c.low_price,
                close: c.trade_price,
                volume: c.candle_acc_trade_volume,
                timestamp,
            }
        })
        .collect())
}

#[derive(Deserialize)]
struct Account {
    currency: String,
    balance: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    uuid: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    executed_volume: Option<String>,
}
