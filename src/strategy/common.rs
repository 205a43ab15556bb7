//! Shared strategy plumbing (spec §4.5): cooldown tracking, the bounded
//! recent-signal ring, and the evaluation context every strategy reads.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::model::{GameId, Side, StrategyId, StrategyKind, TradeSignal};

pub const SIGNAL_RING_CAPACITY: usize = 100;

/// Context passed to every `evaluate` call: wall-clock time (for
/// deterministic cooldown math in tests) and the configured bankroll used
/// by Kelly-sized strategies.
pub struct EvalContext {
    pub now: DateTime<Utc>,
    pub bankroll_units: Decimal,
}

/// Per-market cooldown: after emitting for a ticker at time t, further
/// signals for that ticker are suppressed until t + cooldown_minutes
/// (spec §4.5 "Cooldowns are enforced inside each strategy").
#[derive(Debug, Default, Clone)]
pub struct CooldownMap {
    next_allowed: HashMap<String, DateTime<Utc>>,
}

impl CooldownMap {
    pub fn is_cooling_down(&self, ticker: &str, now: DateTime<Utc>) -> bool {
        self.next_allowed.get(ticker).is_some_and(|t| now < *t)
    }

    pub fn mark(&mut self, ticker: &str, now: DateTime<Utc>, cooldown_minutes: i64) {
        self.next_allowed
            .insert(ticker.to_string(), now + chrono::Duration::minutes(cooldown_minutes));
    }
}

/// Bounded ring of the last [`SIGNAL_RING_CAPACITY`] signals a strategy
/// emitted, shared by every kind (spec §4.5).
#[derive(Debug, Default)]
pub struct SignalRing {
    signals: VecDeque<TradeSignal>,
}

impl SignalRing {
    pub fn push(&mut self, signal: TradeSignal) {
        if self.signals.len() >= SIGNAL_RING_CAPACITY {
            self.signals.pop_front();
        }
        self.signals.push_back(signal);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TradeSignal> {
        self.signals.iter()
    }

    pub fn as_deque(&self) -> &VecDeque<TradeSignal> {
        &self.signals
    }
}

pub fn build_signal(
    strategy_id: StrategyId,
    kind: StrategyKind,
    game_id: GameId,
    market_ticker: &str,
    side: Side,
    quantity: i64,
    confidence: Decimal,
    reason: impl Into<String>,
    metadata: Value,
    now: DateTime<Utc>,
) -> TradeSignal {
    TradeSignal {
        strategy_id,
        strategy_kind: kind,
        game_id,
        market_ticker: market_ticker.to_string(),
        side,
        quantity,
        confidence,
        reason: reason.into(),
        metadata,
        emitted_at: now,
    }
}

/// Every strategy kind implements this; the engine holds a
/// `Vec<Box<dyn Strategy>>` (spec §4.5 "registry of strategy kinds").
pub trait Strategy: Send {
    fn id(&self) -> StrategyId;
    fn kind(&self) -> StrategyKind;
    fn enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);
    fn evaluate(&mut self, game: &crate::gamestate::GameState, ctx: &EvalContext) -> Vec<TradeSignal>;
    fn recent_signals(&self) -> &VecDeque<TradeSignal>;
}
