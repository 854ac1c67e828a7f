use std::collections::HashMap;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use common::Error;
use strategy::StrategyParams;

use crate::AppState;

pub fn trading_router() -> Router<AppState> {
    Router::new()
        .route("/api/trading/start", post(start_trading))
        .route("/api/trading/stop", post(stop_trading))
        .route("/api/trading/status", get(trading_status))
}

#[derive(Deserialize)]
struct StartRequest {
    market: String,
    strategy: String,
    #[serde(default)]
    parameters: HashMap<String, Value>,
}

/// Register a market and spawn its polling task. Returns as soon as the task
/// is scheduled; the response never waits on the trading loop.
async fn start_trading(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> (StatusCode, Json<Value>) {
    let params = StrategyParams::new(req.parameters);
    match state
        .runner
        .register_market(&req.market, &req.strategy, &params)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": format!("Trading started for {}", req.market),
            })),
        ),
        Err(e) => {
            warn!(market = %req.market, error = %e, "Registration rejected");
            error_response(e)
        }
    }
}

#[derive(Deserialize)]
struct StopRequest {
    /// Omit to stop every active market.
    market: Option<String>,
}

async fn stop_trading(
    State(state): State<AppState>,
    Json(req): Json<StopRequest>,
) -> Json<Value> {
    state.runner.unregister_market(req.market.as_deref()).await;
    let message = match req.market {
        Some(market) => format!("Trading stopped for {market}"),
        None => "Trading stopped for all markets".to_string(),
    };
    Json(json!({ "status": "success", "message": message }))
}

async fn trading_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "active_markets": state.runner.list_active().await,
    }))
}

/// Map core errors onto HTTP statuses for the control surface.
pub(crate) fn error_response(err: Error) -> (StatusCode, Json<Value>) {
    let status = match &err {
        Error::AlreadyActive(_) => StatusCode::CONFLICT,
        Error::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        Error::InsufficientData { .. } | Error::DegenerateVolatility(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        Error::DataUnavailable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}
