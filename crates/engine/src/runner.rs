use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use common::{
    base_asset, BrokerPort, Error, MarketDataPort, OrderSide, OrderSizing, Result, Signal,
};
use strategy::{build_strategy, MarketWindow, Strategy, StrategyParams, StrategyState};

/// Seconds between strategy evaluations unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// One registry entry: the market's cancellation handle and its task.
/// The strategy instance and its `StrategyState` live inside the task —
/// no other code can reach them.
struct ActiveStrategy {
    strategy_name: String,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns one cancellable polling task per active market and drives the
/// signal → order pipeline.
///
/// Registration returns as soon as the task is spawned; the task lives
/// independently of any caller. A market key exists in the registry exactly
/// while its task is running or winding down after a stop request.
pub struct StrategyRunner {
    data: Arc<dyn MarketDataPort>,
    broker: Arc<dyn BrokerPort>,
    poll_interval: Duration,
    /// How buy orders are sized. Full available quote balance by default.
    buy_sizing: OrderSizing,
    active: Mutex<HashMap<String, ActiveStrategy>>,
}

impl StrategyRunner {
    pub fn new(
        data: Arc<dyn MarketDataPort>,
        broker: Arc<dyn BrokerPort>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            data,
            broker,
            poll_interval,
            buy_sizing: OrderSizing::FullBalance,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the default full-balance buy sizing, e.g. with a fixed quote
    /// amount per order.
    pub fn with_buy_sizing(mut self, sizing: OrderSizing) -> Self {
        self.buy_sizing = sizing;
        self
    }

    /// Start trading a market with the named strategy.
    ///
    /// Fails with `AlreadyActive` if the market is already registered and
    /// with `InvalidParameters` if the strategy rejects its configuration;
    /// both surface synchronously, before any task is spawned.
    pub async fn register_market(
        &self,
        market: &str,
        strategy_name: &str,
        params: &StrategyParams,
    ) -> Result<()> {
        let mut active = self.active.lock().await;
        if active.contains_key(market) {
            return Err(Error::AlreadyActive(market.to_string()));
        }

        let strat = build_strategy(strategy_name, market, params)?;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(market_loop(
            market.to_string(),
            strat,
            StrategyState::new(),
            self.data.clone(),
            self.broker.clone(),
            self.poll_interval,
            self.buy_sizing,
            cancel_rx,
        ));

        info!(market, strategy = strategy_name, "Market registered");
        active.insert(
            market.to_string(),
            ActiveStrategy {
                strategy_name: strategy_name.to_string(),
                cancel_tx,
                task,
            },
        );
        Ok(())
    }

    /// Stop one market, or every market when `None`.
    ///
    /// Signals the task's cancel handle, then awaits the task so the caller
    /// observes confirmed shutdown. An in-flight sleep is interrupted
    /// immediately; an in-flight network call completes first. Unknown
    /// markets are a no-op.
    pub async fn unregister_market(&self, market: Option<&str>) {
        let removed: Vec<(String, ActiveStrategy)> = {
            let mut active = self.active.lock().await;
            match market {
                Some(m) => active.remove_entry(m).into_iter().collect(),
                None => active.drain().collect(),
            }
        };

        for (market, entry) in removed {
            let _ = entry.cancel_tx.send(true);
            if let Err(e) = entry.task.await {
                if e.is_panic() {
                    error!(market = %market, "Polling task panicked before shutdown");
                }
            }
            info!(market = %market, strategy = %entry.strategy_name, "Market unregistered");
        }
    }

    /// Identifiers of all currently registered markets, sorted.
    pub async fn list_active(&self) -> Vec<String> {
        let active = self.active.lock().await;
        let mut markets: Vec<String> = active.keys().cloned().collect();
        markets.sort();
        markets
    }
}

/// The per-market polling loop. Ticks run strictly sequentially: a tick's
/// order placement always completes before the next tick starts, so one
/// market can never have two concurrent orders.
#[allow(clippy::too_many_arguments)]
async fn market_loop(
    market: String,
    mut strat: Box<dyn Strategy>,
    mut state: StrategyState,
    data: Arc<dyn MarketDataPort>,
    broker: Arc<dyn BrokerPort>,
    poll_interval: Duration,
    buy_sizing: OrderSizing,
    mut cancel_rx: watch::Receiver<bool>,
) {
    info!(market = %market, strategy = %strat.name(), "Polling task started");
    loop {
        // Per-tick errors are contained here: a failed fetch or evaluation
        // must not end the task, or the market would silently stop trading.
        // The next attempt is a full poll interval away, which is backoff
        // enough. No retries.
        if let Err(e) = tick(
            &market,
            strat.as_mut(),
            &mut state,
            data.as_ref(),
            broker.as_ref(),
            buy_sizing,
            &cancel_rx,
        )
        .await
        {
            warn!(market = %market, error = %e, "Tick failed, continuing");
        }

        if *cancel_rx.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = cancel_rx.changed() => break,
        }
    }
    info!(market = %market, "Polling task stopped");
}

/// One evaluation cycle: fetch the declared windows, evaluate, gate through
/// the dedup cooldown, place the order.
async fn tick(
    market: &str,
    strat: &mut dyn Strategy,
    state: &mut StrategyState,
    data: &dyn MarketDataPort,
    broker: &dyn BrokerPort,
    buy_sizing: OrderSizing,
    cancel_rx: &watch::Receiver<bool>,
) -> Result<()> {
    let wanted = strat.window().clone();
    let mut windows = Vec::with_capacity(wanted.tickers.len());
    for ticker in &wanted.tickers {
        let candles = data.candles(ticker, wanted.interval, wanted.count).await?;
        windows.push(MarketWindow {
            market: ticker.clone(),
            candles,
        });
    }

    // Cancellation checkpoint between fetch and order placement: a stop that
    // arrived while the request was in flight discards the fetched data.
    if *cancel_rx.borrow() {
        return Ok(());
    }

    let signal = strat.evaluate(&windows)?;
    if !state.should_execute(&signal, Utc::now()) {
        return Ok(());
    }
    place_order(market, &signal, state, broker, buy_sizing).await;
    Ok(())
}

/// Translate an accepted signal into a broker order.
///
/// Buys use the runner's configured sizing (full quote balance by default).
/// Sells are sized by the held base-asset balance and skipped entirely when
/// nothing is held. Failures are logged and the tick ends; `StrategyState`
/// is not rolled back.
async fn place_order(
    market: &str,
    signal: &Signal,
    state: &mut StrategyState,
    broker: &dyn BrokerPort,
    buy_sizing: OrderSizing,
) {
    let side = match signal.kind.order_side() {
        Some(side) => side,
        None => return,
    };

    let result = match side {
        OrderSide::Buy => broker.place_order(market, OrderSide::Buy, buy_sizing).await,
        OrderSide::Sell => {
            let asset = base_asset(market);
            match broker.balance(asset).await {
                Ok(balance) if balance > 0.0 => {
                    broker
                        .place_order(market, OrderSide::Sell, OrderSizing::Amount(balance))
                        .await
                }
                Ok(_) => {
                    info!(market = %market, "Sell signal with no holdings, skipped");
                    return;
                }
                Err(e) => {
                    error!(market = %market, error = %e, "Balance query failed");
                    return;
                }
            }
        }
    };

    match result {
        Ok(fill) => {
            info!(
                market = %market,
                side = %side,
                price = fill.filled_price,
                amount = fill.filled_amount,
                "Order filled"
            );
            state.apply_fill(signal);
        }
        Err(e) => {
            error!(market = %market, side = %side, error = %e, "Order submission failed");
        }
    }
}
