//! SharpLine (spec §4.5.1): persistent divergence between exchange mid
//! and sportsbook consensus on moneyline markets.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::gamestate::GameState;
use crate::model::{Side, StrategyId, StrategyKind, TradeSignal};
use crate::oddsmath::{american_to_prob, ev_percent, kelly_fraction, median};
use crate::ticker;

use super::common::{build_signal, CooldownMap, EvalContext, SignalRing, Strategy};
use super::config::SharpLineConfig;

pub struct SharpLineStrategy {
    id: StrategyId,
    enabled: bool,
    config: SharpLineConfig,
    cooldowns: CooldownMap,
    signals: SignalRing,
}

impl SharpLineStrategy {
    pub fn new(id: StrategyId, config: SharpLineConfig) -> Self {
        Self { id, enabled: true, config, cooldowns: CooldownMap::default(), signals: SignalRing::default() }
    }

    fn evaluate_market(&mut self, game: &GameState, ticker_str: &str, ctx: &EvalContext) -> Option<TradeSignal> {
        let parsed = ticker::parse_market_ticker(ticker_str).ok()?;
        if !parsed.suffix.is_moneyline() {
            return None;
        }
        if self.cooldowns.is_cooling_down(ticker_str, ctx.now) {
            return None;
        }

        let ob = game.orderbook(ticker_str)?;
        let (yes_bid, yes_ask) = (ob.yes_bid?, ob.yes_ask?);
        let mid = Decimal::from(yes_bid + yes_ask) / Decimal::from(2);
        let p_exch = mid / Decimal::from(100);

        let is_home = parsed.suffix.is_home_moneyline();
        let probs: Vec<Decimal> = game
            .odds
            .values()
            .filter_map(|q| {
                let ml = if is_home { q.moneyline_home } else { q.moneyline_away };
                ml.map(american_to_prob)
            })
            .collect();
        if probs.len() < self.config.min_sample_sportsbooks {
            return None;
        }
        let p_cons = median(&probs)?;

        let divergence = p_cons - p_exch;
        if (divergence * Decimal::from(100)).abs() < self.config.threshold_percent {
            return None;
        }

        let (side, entry) = if divergence > Decimal::ZERO {
            (Side::Yes, Decimal::from(yes_ask))
        } else {
            let no_ask = ob.no_ask.map(Decimal::from).unwrap_or(Decimal::from(100 - yes_bid));
            (Side::No, no_ask)
        };

        let p_cons_for_side = if side == Side::Yes { p_cons } else { Decimal::ONE - p_cons };
        let ev = ev_percent(p_cons_for_side, entry / Decimal::from(100));
        if ev < self.config.min_ev_percent {
            return None;
        }

        let quantity = if self.config.use_kelly_sizing {
            let k = kelly_fraction(p_cons_for_side, entry / Decimal::from(100));
            let sized = (self.config.kelly_fraction * k * ctx.bankroll_units).floor();
            sized
                .max(Decimal::ZERO)
                .min(Decimal::from(self.config.position_size))
                .to_i64()
                .unwrap_or(0)
        } else {
            self.config.position_size
        };
        if quantity <= 0 {
            return None;
        }

        self.cooldowns.mark(ticker_str, ctx.now, self.config.cooldown_minutes);

        Some(build_signal(
            self.id,
            StrategyKind::SharpLine,
            game.game_id,
            ticker_str,
            side,
            quantity,
            (ev / dec!(100)).min(Decimal::ONE).max(Decimal::ZERO),
            format!("sharp line divergence {divergence} ev {ev}%"),
            serde_json::json!({
                "p_cons": p_cons.to_string(),
                "p_exch": p_exch.to_string(),
                "divergence": divergence.to_string(),
                "ev_percent": ev.to_string(),
            }),
            ctx.now,
        ))
    }
}

impl Strategy for SharpLineStrategy {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::SharpLine
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn evaluate(&mut self, game: &GameState, ctx: &EvalContext) -> Vec<TradeSignal> {
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
    use crate::model::{Game, GameId, OddsQuote, OrderbookState, Phase, Vendor};
    use chrono::Utc;

    fn game_with_market() -> (GameState, String) {
        let g = Game {
            id: GameId::new(),
            event_ticker: "KXNBAGAME-24NOV05LALBOS".to_string(),
            nba_game_id: None,
            home_team: "BOS".to_string(),
            away_team: "LAL".to_string(),
            scheduled_start: Utc::now(),
            phase: Phase::Live,
        };
        let mut gs = GameState::new(&g);
        let ticker = "KXNBAGAME-24NOV05LALBOS-Y".to_string();
        let mut ob = OrderbookState::empty(Utc::now());
        ob.yes_bid = Some(42);
        ob.yes_ask = Some(44);
        gs.apply_orderbook(&ticker, ob);
        for (vendor, american) in [("a", -150), ("b", -140), ("c", -160)] {
            gs.apply_odds(OddsQuote {
                vendor: Vendor(vendor.to_string()),
                moneyline_home: Some(american),
                moneyline_away: None,
                spread_value: None,
                spread_home_odds: None,
                total_value: None,
                over_odds: None,
                under_odds: None,
                last_update: Utc::now(),
            });
        }
        (gs, ticker)
    }

    #[test]
    fn s1_worked_example_emits_yes_signal() {
        let (gs, ticker) = game_with_market();
        let mut strat = SharpLineStrategy::new(StrategyId::new(), SharpLineConfig::default());
        let ctx = EvalContext { now: Utc::now(), bankroll_units: dec!(10000) };
        let signals = strat.evaluate(&gs, &ctx);
        assert_eq!(signals.len(), 1);
        let s = &signals[0];
        assert_eq!(s.side, Side::Yes);
        assert_eq!(s.market_ticker, ticker);
        assert_eq!(s.quantity, 10);
    }

    #[test]
    fn cooldown_suppresses_repeat_signal() {
        let (gs, _) = game_with_market();
        let mut strat = SharpLineStrategy::new(StrategyId::new(), SharpLineConfig::default());
        let now = Utc::now();
        let ctx = EvalContext { now, bankroll_units: dec!(10000) };
        assert_eq!(strat.evaluate(&gs, &ctx).len(), 1);
        let ctx2 = EvalContext { now: now + chrono::Duration::seconds(30), bankroll_units: dec!(10000) };
        assert_eq!(strat.evaluate(&gs, &ctx2).len(), 0);
    }

    #[test]
    fn insufficient_vendor_sample_emits_nothing() {
        let g = Game {
            id: GameId::new(),
            event_ticker: "KXNBAGAME-24NOV05LALBOS".to_string(),
            nba_game_id: None,
            home_team: "BOS".to_string(),
            away_team: "LAL".to_string(),
            scheduled_start: Utc::now(),
            phase: Phase::Live,
        };
        let mut gs = GameState::new(&g);
        let ticker = "KXNBAGAME-24NOV05LALBOS-Y".to_string();
        let mut ob = OrderbookState::empty(Utc::now());
        ob.yes_bid = Some(42);
        ob.yes_ask = Some(44);
        gs.apply_orderbook(&ticker, ob);
        gs.apply_odds(OddsQuote {
            vendor: Vendor("a".to_string()),
            moneyline_home: Some(-150),
            moneyline_away: None,
            spread_value: None,
            spread_home_odds: None,
            total_value: None,
            over_odds: None,
            under_odds: None,
            last_update: Utc::now(),
        });
        let mut strat = SharpLineStrategy::new(StrategyId::new(), SharpLineConfig::default());
        let ctx = EvalContext { now: Utc::now(), bankroll_units: dec!(10000) };
        assert!(strat.evaluate(&gs, &ctx).is_empty());
    }
}
