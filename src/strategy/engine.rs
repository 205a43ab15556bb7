//! StrategyEngine (C5, spec §4.5): evaluates the registered strategy
//! kinds against every loaded game on a fixed cadence and fans emitted
//! signals out to whatever downstream handler is registered (the
//! execution engine, in production wiring).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::aggregator::Aggregator;
use crate::model::{Phase, StrategyId, TradeSignal};

use super::common::EvalContext;
use super::Strategy;

/// Receives every signal a strategy emits. The execution engine
/// implements this in production wiring; tests can substitute a
/// recording handler.
#[async_trait]
pub trait SignalHandler: Send + Sync {
    async fn handle(&self, signal: TradeSignal);
}

/// Soft budget for a single strategy's `evaluate()` call (spec §5: "every
/// strategy evaluate() runs under a 500ms soft budget — exceeding it is
/// logged but does not abort the call").
const EVALUATE_SOFT_BUDGET: Duration = Duration::from_millis(500);

pub struct StrategyEngine {
    aggregator: Arc<Aggregator>,
    strategies: Mutex<Vec<Box<dyn Strategy>>>,
    handlers: Mutex<Vec<Arc<dyn SignalHandler>>>,
    evaluation_interval: Duration,
    bankroll_units: Decimal,
}

impl StrategyEngine {
    pub fn new(aggregator: Arc<Aggregator>, evaluation_interval: Duration, bankroll_units: Decimal) -> Arc<Self> {
        Arc::new(Self {
            aggregator,
            strategies: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
            evaluation_interval,
            bankroll_units,
        })
    }

    pub fn register_strategy(&self, strategy: Box<dyn Strategy>) {
        self.strategies.lock().push(strategy);
    }

    pub fn register_handler(&self, handler: Arc<dyn SignalHandler>) {
        self.handlers.lock().push(handler);
    }

    pub fn set_enabled(&self, strategy_id: StrategyId, enabled: bool) {
        for s in self.strategies.lock().iter_mut() {
            if s.id() == strategy_id {
                s.set_enabled(enabled);
            }
        }
    }

    pub fn recent_signals(&self, strategy_id: StrategyId) -> Vec<TradeSignal> {
        self.strategies
            .lock()
            .iter()
            .find(|s| s.id() == strategy_id)
            .map(|s| s.recent_signals().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Runs the evaluation loop until the returned handle is aborted.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.evaluation_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.evaluate_once().await;
        }
    }

    async fn evaluate_once(&self) {
        let now = chrono::Utc::now();
        let ctx = EvalContext { now, bankroll_units: self.bankroll_units };
        let games = self.aggregator.list_states();
        let handlers = self.handlers.lock().clone();

        let mut signals = Vec::new();
        {
            let mut strategies = self.strategies.lock();
            for strategy in strategies.iter_mut() {
                if !strategy.enabled() {
                    continue;
                }
                for game in &games {
                    if game.phase == Phase::Finished {
                        continue;
                    }
                    let started = Instant::now();
                    let emitted = strategy.evaluate(game, &ctx);
                    let elapsed = started.elapsed();
                    if elapsed > EVALUATE_SOFT_BUDGET {
                        warn!(
                            strategy = ?strategy.kind(),
                            game_id = ?game.game_id,
                            elapsed_ms = elapsed.as_millis(),
                            "strategy evaluate() exceeded its 500ms soft budget"
                        );
                    }
                    signals.extend(emitted);
                }
            }
        }

        for signal in signals {
            debug!(strategy = ?signal.strategy_kind, ticker = %signal.market_ticker, "signal emitted");
            for handler in &handlers {
                handler.handle(signal.clone()).await;
            }
            if handlers.is_empty() {
                warn!("signal emitted with no registered handler");
            }
        }
    }
}
