//! EvMultiBook (spec §4.5.3): requires independent agreement among
//! multiple sportsbooks that a market is mispriced against the exchange.

use rust_decimal::Decimal;

use crate::gamestate::GameState;
use crate::model::{Side, StrategyId, StrategyKind, TradeSignal};
use crate::oddsmath::{american_to_prob, ev_percent};
use crate::ticker;

use super::common::{build_signal, CooldownMap, EvalContext, SignalRing, Strategy};
use super::config::EvMultiBookConfig;

pub struct EvMultiBookStrategy {
    id: StrategyId,
    enabled: bool,
    config: EvMultiBookConfig,
    cooldowns: CooldownMap,
    signals: SignalRing,
}

impl EvMultiBookStrategy {
    pub fn new(id: StrategyId, config: EvMultiBookConfig) -> Self {
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
        let yes_ask = Decimal::from(ob.yes_ask?);
        let no_ask = ob.no_ask.map(Decimal::from).unwrap_or(Decimal::from(100) - Decimal::from(ob.yes_bid?));

        let is_home = parsed.suffix.is_home_moneyline();

        let mut yes_agree: Vec<(&str, Decimal)> = Vec::new();
        let mut no_agree: Vec<(&str, Decimal)> = Vec::new();

        for quote in game.odds.values() {
            let vendor = quote.vendor.as_str();
            if !self.config.preferred_books.is_empty() && !self.config.preferred_books.iter().any(|b| b == vendor) {
                continue;
            }
            if self.config.exclude_books.iter().any(|b| b == vendor) {
                continue;
            }
            let ml = if is_home { quote.moneyline_home } else { quote.moneyline_away };
            let Some(ml) = ml else { continue };
            let p_v = american_to_prob(ml);

            let ev_yes = ev_percent(p_v, yes_ask / Decimal::from(100));
            if ev_yes >= self.config.min_ev_percent {
                yes_agree.push((vendor, ev_yes));
            }
            let ev_no = ev_percent(Decimal::ONE - p_v, no_ask / Decimal::from(100));
            if ev_no >= self.config.min_ev_percent {
                no_agree.push((vendor, ev_no));
            }
        }

        let (side, agreeing, entry) = match yes_agree.len().cmp(&no_agree.len()) {
            std::cmp::Ordering::Greater => (Side::Yes, yes_agree, yes_ask),
            std::cmp::Ordering::Less => (Side::No, no_agree, no_ask),
            std::cmp::Ordering::Equal => {
                if yes_agree.is_empty() {
                    return None;
                }
                let best_yes = yes_agree.iter().map(|(_, ev)| *ev).fold(Decimal::MIN, Decimal::max);
                let best_no = no_agree.iter().map(|(_, ev)| *ev).fold(Decimal::MIN, Decimal::max);
                if best_yes >= best_no {
                    (Side::Yes, yes_agree, yes_ask)
                } else {
                    (Side::No, no_agree, no_ask)
                }
            }
        };

        if agreeing.len() < self.config.min_sportsbooks_agreeing {
            return None;
        }

        let (best_book, best_ev) = agreeing
            .iter()
            .max_by(|a, b| a.1.cmp(&b.1))
            .map(|(book, ev)| (book.to_string(), *ev))
            .unwrap();

        self.cooldowns.mark(ticker_str, ctx.now, self.config.cooldown_minutes);

        Some(build_signal(
            self.id,
            StrategyKind::EvMultiBook,
            game.game_id,
            ticker_str,
            side,
            self.config.position_size,
            (best_ev / Decimal::from(100)).clamp(Decimal::ZERO, Decimal::ONE),
            format!("{} books agree +EV ({best_book} best at {best_ev}%)", agreeing.len()),
            serde_json::json!({
                "best_book": best_book,
                "best_ev_percent": best_ev.to_string(),
                "entry_cents": entry.to_string(),
                "agreeing_books": agreeing.iter().map(|(b, _)| *b).collect::<Vec<_>>(),
            }),
            ctx.now,
        ))
    }
}

impl Strategy for EvMultiBookStrategy {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::EvMultiBook
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

    #[test]
    fn two_books_agreeing_emit_signal() {
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
        ob.yes_bid = Some(40);
        ob.yes_ask = Some(42);
        ob.no_ask = Some(60);
        gs.apply_orderbook(&ticker, ob);
        for (v, ml) in [("a", -200), ("b", -180)] {
            gs.apply_odds(OddsQuote {
                vendor: Vendor(v.to_string()),
                moneyline_home: Some(ml),
                moneyline_away: None,
                spread_value: None,
                spread_home_odds: None,
                total_value: None,
                over_odds: None,
                under_odds: None,
                last_update: Utc::now(),
            });
        }
        let mut strat = EvMultiBookStrategy::new(StrategyId::new(), EvMultiBookConfig::default());
        let ctx = EvalContext { now: Utc::now(), bankroll_units: Decimal::from(10000) };
        let signals = strat.evaluate(&gs, &ctx);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Yes);
    }
}
