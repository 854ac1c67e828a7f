use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{BrokerPort, Config, MarketDataPort, TradingMode};
use engine::{StrategyRunner, UpbitClient};
use paper::PaperBroker;

/// Paper-trading starting stake in KRW.
const PAPER_INITIAL_KRW: f64 = 10_000_000.0;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ───────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(mode = %cfg.trading_mode, "Surge starting");

    // ── Exchange client ──────────────────────────────────────────────────────
    // Market data always comes from Upbit; the broker side is swapped out
    // for the simulator in paper mode.
    let upbit = Arc::new(UpbitClient::new(
        &cfg.upbit_access_key,
        &cfg.upbit_secret_key,
    ));
    let data: Arc<dyn MarketDataPort> = upbit.clone();

    let broker: Arc<dyn BrokerPort> = match cfg.trading_mode {
        TradingMode::Live => {
            info!("Live trading mode, orders go to Upbit");
            upbit
        }
        TradingMode::Paper => {
            info!(
                slippage_bps = cfg.paper_slippage_bps,
                "Paper trading mode, using PaperBroker"
            );
            Arc::new(PaperBroker::new(
                data.clone(),
                PAPER_INITIAL_KRW,
                cfg.paper_slippage_bps,
            ))
        }
    };

    // ── Strategy runner ──────────────────────────────────────────────────────
    let runner = Arc::new(StrategyRunner::new(
        data.clone(),
        broker,
        Duration::from_secs(cfg.poll_interval_secs),
    ));

    // ── Control API ──────────────────────────────────────────────────────────
    let api_state = api::AppState {
        runner: runner.clone(),
        data,
        trading_mode: cfg.trading_mode,
        api_token: cfg.api_token.clone(),
    };
    tokio::spawn(api::serve(api_state, cfg.api_port));

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();

    info!("Shutdown signal received. Stopping active markets.");
    runner.unregister_market(None).await;
}
