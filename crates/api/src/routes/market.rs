use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use common::{CandleInterval, MarketDataPort};
use strategy::{stats, InverseVolatility, StrategyParams};

use crate::routes::trading::error_response;
use crate::AppState;

pub fn market_router() -> Router<AppState> {
    Router::new()
        .route("/api/market/candles/:market", get(get_candles))
        .route("/api/market/volatility/:market", get(get_volatility))
        .route("/api/portfolio/allocate", post(allocate_portfolio))
}

#[derive(Deserialize)]
struct CandlesQuery {
    count: Option<usize>,
    unit: Option<String>,
}

/// Recent candles for a market, newest-first.
async fn get_candles(
    State(state): State<AppState>,
    Path(market): Path<String>,
    Query(q): Query<CandlesQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let count = q.count.unwrap_or(50).min(200);
    let interval = match q.unit.as_deref() {
        None | Some("days") => CandleInterval::Day,
        Some(other) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("unsupported unit '{other}'") })),
            ))
        }
    };

    let candles = state
        .data
        .candles(&market, interval, count)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "market": market, "candles": candles })))
}

#[derive(Deserialize)]
struct VolatilityQuery {
    window: Option<usize>,
}

/// Volatility of a market's daily closes over a lookback window, returned
/// with the series it was computed from.
async fn get_volatility(
    State(state): State<AppState>,
    Path(market): Path<String>,
    Query(q): Query<VolatilityQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let window = q.window.unwrap_or(20).clamp(2, 200);
    let candles = state
        .data
        .candles(&market, CandleInterval::Day, window)
        .await
        .map_err(error_response)?;

    // Newest-first on the wire; the volatility math wants oldest-first
    let closes: Vec<f64> = candles.iter().rev().map(|c| c.close).collect();
    let volatility = stats::volatility(&closes);

    let data: Vec<Value> = candles
        .iter()
        .rev()
        .map(|c| json!({ "date": c.timestamp.to_rfc3339(), "close": c.close }))
        .collect();

    Ok(Json(json!({
        "market": market,
        "window": window,
        "volatility": volatility,
        "data": data,
    })))
}

#[derive(Deserialize)]
struct AllocateRequest {
    #[serde(default)]
    parameters: HashMap<String, Value>,
}

/// Inverse-volatility portfolio weights over the requested tickers.
async fn allocate_portfolio(
    State(state): State<AppState>,
    Json(req): Json<AllocateRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let params = StrategyParams::new(req.parameters);
    let allocator = InverseVolatility::from_params(&params).map_err(error_response)?;
    let weights = allocator
        .allocate(state.data.as_ref())
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "status": "success", "weights": weights })))
}
