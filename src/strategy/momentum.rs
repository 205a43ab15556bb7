//! Momentum (spec §4.5.2): follow short-horizon mid-price moves on any
//! configured market kind.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::gamestate::GameState;
use crate::model::{Side, StrategyId, StrategyKind, TradeSignal};
use crate::ticker;

use super::common::{build_signal, CooldownMap, EvalContext, SignalRing, Strategy};
use super::config::MomentumConfig;

const HISTORY_CAPACITY: usize = 100;

pub struct MomentumStrategy {
    id: StrategyId,
    enabled: bool,
    config: MomentumConfig,
    cooldowns: CooldownMap,
    signals: SignalRing,
    history: HashMap<String, VecDeque<(DateTime<Utc>, i32)>>,
}

impl MomentumStrategy {
    pub fn new(id: StrategyId, config: MomentumConfig) -> Self {
        Self {
            id,
            enabled: true,
            config,
            cooldowns: CooldownMap::default(),
            signals: SignalRing::default(),
            history: HashMap::new(),
        }
    }

    fn evaluate_market(&mut self, game: &GameState, ticker_str: &str, ctx: &EvalContext) -> Option<TradeSignal> {
        let parsed = ticker::parse_market_ticker(ticker_str).ok()?;
        if !self.config.market_types.iter().any(|t| t == parsed.suffix.category()) {
            return None;
        }
        if self.cooldowns.is_cooling_down(ticker_str, ctx.now) {
            return None;
        }

        let ob = game.orderbook(ticker_str)?;
        let mid = ob.yes_mid_cents()?;
        let mid_cents: i32 = mid.to_i32()?;

        let history = self.history.entry(ticker_str.to_string()).or_default();
        history.push_back((ctx.now, mid_cents));
        if history.len() > HISTORY_CAPACITY {
            history.pop_front();
        }

        let target_age = chrono::Duration::seconds(self.config.lookback_seconds);
        let tolerance = self.config.lookback_seconds / 2;

        let historical = history
            .iter()
            .filter(|(ts, _)| *ts != ctx.now)
            .min_by_key(|(ts, _)| ((ctx.now - *ts) - target_age).num_seconds().abs())?;

        let age_secs = (ctx.now - historical.0).num_seconds();
        if (age_secs - self.config.lookback_seconds).abs() > tolerance {
            return None;
        }

        let (yes_bid, yes_ask) = (ob.yes_bid?, ob.yes_ask?);
        let spread = yes_ask - yes_bid;
        if spread > self.config.max_spread_cents {
            return None;
        }

        let delta = mid_cents - historical.1;
        if delta.abs() < self.config.min_price_change_cents {
            return None;
        }

        let (side, entry) = if delta > 0 {
            (Side::Yes, yes_ask)
        } else {
            let no_ask = ob.no_ask.unwrap_or(100 - yes_bid);
            (Side::No, no_ask)
        };

        self.cooldowns.mark(ticker_str, ctx.now, self.config.cooldown_minutes);

        let confidence = (Decimal::from(delta.abs()) / Decimal::from(20)).min(Decimal::ONE);

        Some(build_signal(
            self.id,
            StrategyKind::Momentum,
            game.game_id,
            ticker_str,
            side,
            self.config.position_size,
            confidence,
            format!("momentum delta={delta}c over {age_secs}s, entry={entry}c"),
            serde_json::json!({ "delta_cents": delta, "entry_cents": entry }),
            ctx.now,
        ))
    }
}

impl Strategy for MomentumStrategy {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn evaluate(&mut self, game: &GameState, ctx: &EvalContext) -> Vec<TradeSignal> {
        let tickers: Vec<String> = game.orderbooks.keys().cloned().collect();
        let mut out = Vec::new();
        for t in tickers {
            if let Some(signal) = self.evaluate_market(game, &t, ctx) {
                self.signals.push(signal.clone());
                out.push(signal);
            }
        }
        out
    }

    fn recent_signals(&self) -> &std::collections::VecDeque<TradeSignal> {
        self.signals.as_deque()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Game, GameId, OrderbookState, Phase};
    use chrono::Utc;

    fn game() -> (GameState, String) {
        let g = Game {
            id: GameId::new(),
            event_ticker: "KXNBAGAME-24NOV05LALBOS".to_string(),
            nba_game_id: None,
            home_team: "BOS".to_string(),
            away_team: "LAL".to_string(),
            scheduled_start: Utc::now(),
            phase: Phase::Live,
        };
        (GameState::new(&g), "KXNBAGAME-24NOV05LALBOS-Y".to_string())
    }

    #[test]
    fn s2_scenario_emits_yes_on_momentum() {
        let (mut gs, ticker) = game();
        let mut strat = MomentumStrategy::new(StrategyId::new(), MomentumConfig::default());

        let t0 = Utc::now();
        let mut ob0 = OrderbookState::empty(t0);
        ob0.yes_bid = Some(39);
        ob0.yes_ask = Some(41);
        gs.apply_orderbook(&ticker, ob0);
        let ctx0 = EvalContext { now: t0, bankroll_units: Decimal::from(10000) };
        assert!(strat.evaluate(&gs, &ctx0).is_empty());

        let t1 = t0 + chrono::Duration::seconds(118);
        let mut ob1 = OrderbookState::empty(t1);
        ob1.yes_bid = Some(45);
        ob1.yes_ask = Some(47);
        gs.apply_orderbook(&ticker, ob1);
        let ctx1 = EvalContext { now: t1, bankroll_units: Decimal::from(10000) };
        let signals = strat.evaluate(&gs, &ctx1);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Yes);
    }

    #[test]
    fn wide_spread_suppresses_signal() {
        let (mut gs, ticker) = game();
        let mut strat = MomentumStrategy::new(StrategyId::new(), MomentumConfig::default());
        let t0 = Utc::now();
        let mut ob0 = OrderbookState::empty(t0);
        ob0.yes_bid = Some(39);
        ob0.yes_ask = Some(41);
        gs.apply_orderbook(&ticker, ob0);
        strat.evaluate(&gs, &EvalContext { now: t0, bankroll_units: Decimal::from(10000) });

        let t1 = t0 + chrono::Duration::seconds(118);
        let mut ob1 = OrderbookState::empty(t1);
        ob1.yes_bid = Some(40);
        ob1.yes_ask = Some(50);
        gs.apply_orderbook(&ticker, ob1);
        let signals = strat.evaluate(&gs, &EvalContext { now: t1, bankroll_units: Decimal::from(10000) });
        assert!(signals.is_empty());
    }
}
