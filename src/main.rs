//! Process entry point: composition root for the paper-trading pipeline
//! (spec §5 "process-wide lifecycle"). Wires storage, risk gate,
//! execution engine, strategy engine, and aggregator, then the exchange
//! stream and sports feed, in that order; shutdown reverses it.
//!
//! The HTTP surface below is read-only wiring over the composition
//! root's state (health check plus a few views) — it is not itself a
//! specified component, just the minimum needed to look inside a
//! running instance.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use hoopbook::aggregator::Aggregator;
use hoopbook::config::AppConfig;
use hoopbook::exchange::ExchangeStream;
use hoopbook::execution::ExecutionEngine;
use hoopbook::gamestate::GameState;
use hoopbook::model::{Position, RiskAccount, StrategyId};
use hoopbook::risk::RiskGate;
use hoopbook::signing::StaticKey;
use hoopbook::sportsfeed::SportsFeedClient;
use hoopbook::storage::Storage;
use hoopbook::strategy::{
    CorrelationStrategy, EvMultiBookStrategy, MeanReversionStrategy, MomentumStrategy, SharpLineStrategy,
    StrategyEngine,
};

#[derive(Clone)]
struct AppState {
    aggregator: Arc<Aggregator>,
    execution: Arc<ExecutionEngine>,
    risk: Arc<RiskGate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load();
    hoopbook::logging::init(&config.log_level);

    info!("hoopbook starting up");

    // Startup order (spec §5): storage, risk account, execution engine,
    // strategy engine, aggregator, then the exchange stream and feed.
    let storage = Storage::open(&config.storage_url).context("opening storage")?;

    let risk = Arc::new(RiskGate::new(config.risk.clone(), chrono::Utc::now()));

    let exchange_signer = Arc::new(StaticKey::new(config.exchange_api_key.clone()));
    let sports_auth = Arc::new(StaticKey::new(config.sports_data_api_key.clone()));

    let sportsfeed = Arc::new(
        SportsFeedClient::new(config.sports_data_base_url.clone(), sports_auth).context("building sports feed client")?,
    );
    let exchange = ExchangeStream::spawn(config.exchange_stream_url.clone(), exchange_signer);

    let aggregator = Aggregator::new(
        exchange.clone(),
        sportsfeed.clone(),
        config.nba_poll_interval(),
        config.odds_poll_interval(),
    );

    let execution = ExecutionEngine::new(aggregator.clone(), risk.clone(), storage.clone());
    execution.rebuild_from_storage().context("rebuilding position book from order log")?;

    let strategy_engine = StrategyEngine::new(aggregator.clone(), config.evaluation_interval(), config.bankroll_units);
    register_default_strategies(&strategy_engine);
    strategy_engine.register_handler(execution.clone());

    let strategy_handle = strategy_engine.spawn();

    let state = AppState { aggregator: aggregator.clone(), execution: execution.clone(), risk: risk.clone() };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/games", get(list_games))
        .route("/positions", get(list_positions))
        .route("/risk", get(risk_snapshot))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = "0.0.0.0:8080";
    let listener = tokio::net::TcpListener::bind(addr).await.context("binding http listener")?;
    info!(addr, "read-only http surface listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("http server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // Shutdown reverses startup order (spec §5).
    strategy_handle.abort();
    info!("hoopbook shut down");
    Ok(())
}

/// Registers one instance of each strategy kind with its default
/// configuration (spec §4.5). A real deployment would instead load
/// enabled strategies and their stored `config` JSON from the
/// `strategies` table.
fn register_default_strategies(engine: &Arc<StrategyEngine>) {
    engine.register_strategy(Box::new(SharpLineStrategy::new(StrategyId::new(), Default::default())));
    engine.register_strategy(Box::new(MomentumStrategy::new(StrategyId::new(), Default::default())));
    engine.register_strategy(Box::new(EvMultiBookStrategy::new(StrategyId::new(), Default::default())));
    engine.register_strategy(Box::new(MeanReversionStrategy::new(StrategyId::new(), Default::default())));
    engine.register_strategy(Box::new(CorrelationStrategy::new(StrategyId::new(), Default::default())));
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_games(State(state): State<AppState>) -> Json<Vec<GameState>> {
    Json(state.aggregator.list_states())
}

async fn list_positions(State(state): State<AppState>) -> Json<Vec<Position>> {
    Json(state.execution.open_positions())
}

async fn risk_snapshot(State(state): State<AppState>) -> Json<RiskAccount> {
    Json(state.risk.snapshot())
}
