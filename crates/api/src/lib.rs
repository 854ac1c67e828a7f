mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{MarketDataPort, TradingMode};
use engine::StrategyRunner;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<StrategyRunner>,
    pub data: Arc<dyn MarketDataPort>,
    pub trading_mode: TradingMode,
    pub api_token: String,
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let protected = Router::new()
        .merge(routes::trading_router())
        .merge(routes::market_router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let app = Router::new()
        .merge(protected)
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors);

    info!(%addr, "Control API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
