//! Integration coverage across storage, risk, execution, the strategy
//! engine, and the aggregator, wired the way the composition root wires
//! them but without a live exchange/sports-data connection.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use rust_decimal::Decimal;

use hoopbook::aggregator::Aggregator;
use hoopbook::config::RiskPolicyConfig;
use hoopbook::exchange::ExchangeStream;
use hoopbook::execution::ExecutionEngine;
use hoopbook::model::{Game, GameId, Phase, Side, StrategyId, StrategyKind, TradeSignal};
use hoopbook::risk::RiskGate;
use hoopbook::signing::StaticKey;
use hoopbook::sportsfeed::SportsFeedClient;
use hoopbook::storage::Storage;
use hoopbook::strategy::{SharpLineStrategy, StrategyEngine};

fn build_engine(storage: Storage) -> (Arc<ExecutionEngine>, Arc<Aggregator>) {
    let exchange = ExchangeStream::spawn("ws://127.0.0.1:0".to_string(), Arc::new(StaticKey::new("test")));
    let sportsfeed =
        Arc::new(SportsFeedClient::new("http://127.0.0.1:0".to_string(), Arc::new(StaticKey::new("test"))).unwrap());
    let aggregator = Aggregator::new(exchange, sportsfeed, Duration::from_secs(5), Duration::from_secs(10));
    let risk = Arc::new(RiskGate::new(RiskPolicyConfig::parse_from(["test"]), Utc::now()));
    let execution = ExecutionEngine::new(aggregator.clone(), risk, storage);
    (execution, aggregator)
}

/// A signal with no reachable market data is rejected, the rejection is
/// persisted, and a fresh process rebuilding from that same database finds
/// an empty position book rather than crashing (spec §4.7 "Replay",
/// §8 "Replay of the persisted order log reconstructs the position book
/// exactly").
#[tokio::test]
async fn rejected_order_persists_and_replay_yields_empty_book() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("hoopbook_test.sqlite3");
    let db_path_str = db_path.to_str().unwrap().to_string();

    let game = Game {
        id: GameId::new(),
        event_ticker: "KXNBAGAME-24NOV05LALBOS".to_string(),
        nba_game_id: None,
        home_team: "BOS".to_string(),
        away_team: "LAL".to_string(),
        scheduled_start: Utc::now(),
        phase: Phase::Live,
    };
    let ticker = "KXNBAGAME-24NOV05LALBOS-Y".to_string();
    let strategy_id = StrategyId::new();

    {
        let storage = Storage::open(&db_path_str).unwrap();
        storage.upsert_game(&game).unwrap();
        let (execution, aggregator) = build_engine(storage);
        aggregator.load(game.clone(), vec![ticker.clone()]).await;

        let signal = TradeSignal {
            strategy_id,
            strategy_kind: StrategyKind::SharpLine,
            game_id: game.id,
            market_ticker: ticker.clone(),
            side: Side::Yes,
            quantity: 10,
            confidence: Decimal::new(8, 1),
            reason: "integration test".to_string(),
            metadata: serde_json::json!({}),
            emitted_at: Utc::now(),
        };

        let err = execution.execute_signal(&signal).await.unwrap_err();
        assert!(matches!(err, hoopbook::EngineError::DataUnavailable(_)));
        assert!(execution.open_positions().is_empty());

        aggregator.unload(game.id, vec![ticker]).await;
    }

    {
        let storage = Storage::open(&db_path_str).unwrap();
        let (execution, _aggregator) = build_engine(storage);
        execution.rebuild_from_storage().unwrap();
        assert!(execution.open_positions().is_empty());
    }
}

/// The strategy engine's evaluation loop runs and stops cleanly with a
/// strategy and the execution engine registered, producing no signals
/// when no games are loaded.
#[tokio::test]
async fn strategy_engine_runs_and_stops_with_no_loaded_games() {
    let storage = Storage::open_in_memory().unwrap();
    let (execution, aggregator) = build_engine(storage);

    let strategy_engine = StrategyEngine::new(aggregator, Duration::from_millis(20), Decimal::from(10_000));
    strategy_engine.register_strategy(Box::new(SharpLineStrategy::new(StrategyId::new(), Default::default())));
    strategy_engine.register_handler(execution.clone());

    let handle = strategy_engine.spawn();
    tokio::time::sleep(Duration::from_millis(60)).await;
    handle.abort();

    assert!(execution.open_positions().is_empty());
}
