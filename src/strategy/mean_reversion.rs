//! MeanReversion (spec §4.5.4): fades large intragame swings from a
//! captured pregame anchor price.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::gamestate::GameState;
use crate::model::{Phase, Side, StrategyId, StrategyKind, TradeSignal};
use crate::ticker;

use super::common::{build_signal, CooldownMap, EvalContext, SignalRing, Strategy};
use super::config::MeanReversionConfig;

pub struct MeanReversionStrategy {
    id: StrategyId,
    enabled: bool,
    config: MeanReversionConfig,
    cooldowns: CooldownMap,
    signals: SignalRing,
    /// Pregame mid price in cents, keyed by market ticker, captured the
    /// first time a game is observed Live with a defined mid (spec §4.5.4
    /// — documented as not true historical-pregame truth if a game is
    /// loaded after it has already gone live; see DESIGN.md).
    pregame_price: HashMap<String, i32>,
}

impl MeanReversionStrategy {
    pub fn new(id: StrategyId, config: MeanReversionConfig) -> Self {
        Self {
            id,
            enabled: true,
            config,
            cooldowns: CooldownMap::default(),
            signals: SignalRing::default(),
            pregame_price: HashMap::new(),
        }
    }

    fn capture_anchors(&mut self, game: &GameState) {
        if game.phase != Phase::Live {
            return;
        }
        for (ticker_str, ob) in &game.orderbooks {
            if self.pregame_price.contains_key(ticker_str) {
                continue;
            }
            if let Some(mid) = ob.yes_mid_cents() {
                use rust_decimal::prelude::ToPrimitive;
                if let Some(cents) = mid.to_i32() {
                    self.pregame_price.insert(ticker_str.clone(), cents);
                }
            }
        }
    }

    fn evaluate_market(&mut self, game: &GameState, ticker_str: &str, ctx: &EvalContext) -> Option<TradeSignal> {
        if game.phase != Phase::Live {
            return None;
        }
        let parsed = ticker::parse_market_ticker(ticker_str).ok()?;
        if !parsed.suffix.is_moneyline() {
            return None;
        }
        if self.cooldowns.is_cooling_down(ticker_str, ctx.now) {
            return None;
        }

        let pregame = *self.pregame_price.get(ticker_str)?;
        let ob = game.orderbook(ticker_str)?;
        let mid = ob.yes_mid_cents()?;
        use rust_decimal::prelude::ToPrimitive;
        let current_mid = mid.to_i32()?;

        let swing = current_mid - pregame;
        let swing_abs = Decimal::from(swing.abs());
        if swing_abs < self.config.min_reversion_percent || swing_abs > self.config.max_reversion_percent {
            return None;
        }

        let nba = game.nba_live.as_ref()?;
        let remaining_pct = nba.fraction_remaining() * Decimal::from(100);
        if remaining_pct < self.config.min_time_remaining_pct {
            return None;
        }
        if self.config.only_first_half && nba.period > 2 {
            return None;
        }
        if (nba.home_score - nba.away_score).abs() > self.config.max_score_deficit {
            return None;
        }

        let side = if swing < 0 { Side::Yes } else { Side::No };
        let entry = if side == Side::Yes { ob.yes_ask? } else { ob.no_ask.unwrap_or(100 - ob.yes_bid?) };

        self.cooldowns.mark(ticker_str, ctx.now, self.config.cooldown_minutes);

        Some(build_signal(
            self.id,
            StrategyKind::MeanReversion,
            game.game_id,
            ticker_str,
            side,
            self.config.position_size,
            (swing_abs / self.config.max_reversion_percent).min(Decimal::ONE),
            format!("mean reversion swing={swing}c from pregame={pregame}c, entry={entry}c"),
            serde_json::json!({
                "pregame_cents": pregame,
                "current_mid_cents": current_mid,
                "swing_cents": swing,
                "period": nba.period,
            }),
            ctx.now,
        ))
    }
}

impl Strategy for MeanReversionStrategy {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn evaluate(&mut self, game: &GameState, ctx: &EvalContext) -> Vec<TradeSignal> {
        self.capture_anchors(game);
        let tickers: Vec<String> = game
            .orderbooks
            .keys()
            .filter(|t| matches!(ticker::parse_market_ticker(t).map(|m| m.suffix), Ok(s) if s.is_moneyline()))
            .cloned()
            .collect();
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
    use crate::model::{Game, GameId, NbaLiveState, OrderbookState};
    use chrono::Utc;

    fn live_game() -> (GameState, String) {
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
    fn s5_scenario_emits_yes_on_recovery_expectation() {
        let (mut gs, ticker) = live_game();
        let mut ob = OrderbookState::empty(Utc::now());
        ob.yes_bid = Some(59);
        ob.yes_ask = Some(61);
        gs.apply_orderbook(&ticker, ob);

        let mut strat = MeanReversionStrategy::new(StrategyId::new(), MeanReversionConfig::default());
        let ctx = EvalContext { now: Utc::now(), bankroll_units: Decimal::from(10000) };
        assert!(strat.evaluate(&gs, &ctx).is_empty());

        let mut ob2 = OrderbookState::empty(Utc::now());
        ob2.yes_bid = Some(42);
        ob2.yes_ask = Some(44);
        gs.apply_orderbook(&ticker, ob2);
        gs.apply_nba(NbaLiveState {
            period: 2,
            time_remaining: "9:36".to_string(),
            home_score: 50,
            away_score: 42,
            status: "live".to_string(),
            last_update: Utc::now(),
        });

        let signals = strat.evaluate(&gs, &ctx);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Yes);
    }
}
