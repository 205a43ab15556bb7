//! GameState cache (C3) — the per-game fused view (spec §4.3).
//!
//! `GameState` is mutated only through the handful of methods below; spec
//! §3 reserves exclusive mutation to the Aggregator, and each mutator here
//! returns the tickers it affected so the caller can scope event emission
//! without recomputing anything.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{Game, GameId, NbaLiveState, OddsQuote, OrderbookState, Phase, Vendor};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: GameId,
    pub event_ticker: String,
    pub home_team: String,
    pub away_team: String,
    pub phase: Phase,
    pub orderbooks: HashMap<String, OrderbookState>,
    pub nba_live: Option<NbaLiveState>,
    pub odds: HashMap<Vendor, OddsQuote>,
    /// Derived: ticker -> implied Yes-side probability (spec §4.3).
    pub implied_prob: HashMap<String, Decimal>,
    pub last_updated: DateTime<Utc>,
}

impl GameState {
    pub fn new(game: &Game) -> Self {
        Self {
            game_id: game.id,
            event_ticker: game.event_ticker.clone(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            phase: game.phase,
            orderbooks: HashMap::new(),
            nba_live: None,
            odds: HashMap::new(),
            implied_prob: HashMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Replace a market's orderbook atomically (spec §3: "OrderbookState
    /// inside a GameState is replaced atomically per update — never
    /// mutated field-by-field from outside the Aggregator"). Recomputes
    /// that ticker's implied probability and returns it as the sole
    /// affected ticker.
    pub fn apply_orderbook(&mut self, ticker: &str, state: OrderbookState) -> Vec<String> {
        self.orderbooks.insert(ticker.to_string(), state);
        self.recompute_implied_prob(ticker);
        self.last_updated = state.last_update;
        vec![ticker.to_string()]
    }

    /// Apply a fresh NBA live-scoreboard snapshot. Affects every moneyline
    /// market ticker currently tracked (their implied probability doesn't
    /// change, but downstream strategies keyed on freshness should be
    /// notified of a state change).
    pub fn apply_nba(&mut self, state: NbaLiveState) -> Vec<String> {
        self.last_updated = state.last_update;
        self.nba_live = Some(state);
        self.orderbooks.keys().cloned().collect()
    }

    /// Apply a fresh per-vendor odds quote and recompute nothing directly
    /// (odds don't participate in `implied_prob`, which is exchange-mid
    /// derived) — but still bump `last_updated` and report the game's
    /// markets as affected so strategies re-evaluate against the new
    /// consensus.
    pub fn apply_odds(&mut self, quote: OddsQuote) -> Vec<String> {
        self.last_updated = quote.last_update;
        self.odds.insert(quote.vendor.clone(), quote);
        self.orderbooks.keys().cloned().collect()
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.last_updated = Utc::now();
    }

    /// For a Yes-side market: mid_price/100 when both sides are present,
    /// else the present side, else undefined (spec §4.3).
    fn recompute_implied_prob(&mut self, ticker: &str) {
        let Some(ob) = self.orderbooks.get(ticker) else {
            self.implied_prob.remove(ticker);
            return;
        };
        match ob.yes_mid_cents() {
            Some(mid) => {
                self.implied_prob.insert(ticker.to_string(), mid / Decimal::from(100));
            }
            None => {
                self.implied_prob.remove(ticker);
            }
        }
    }

    pub fn implied_probability(&self, ticker: &str) -> Option<Decimal> {
        self.implied_prob.get(ticker).copied()
    }

    pub fn orderbook(&self, ticker: &str) -> Option<&OrderbookState> {
        self.orderbooks.get(ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::GameId;

    fn game() -> Game {
        Game {
            id: GameId::new(),
            event_ticker: "KXNBAGAME-24NOV05LALBOS".to_string(),
            nba_game_id: None,
            home_team: "BOS".to_string(),
            away_team: "LAL".to_string(),
            scheduled_start: Utc::now(),
            phase: Phase::Scheduled,
        }
    }

    #[test]
    fn apply_orderbook_recomputes_implied_prob() {
        let g = game();
        let mut gs = GameState::new(&g);
        let mut ob = OrderbookState::empty(Utc::now());
        ob.yes_bid = Some(42);
        ob.yes_ask = Some(44);
        let affected = gs.apply_orderbook("KXNBAGAME-24NOV05LALBOS-Y", ob);
        assert_eq!(affected, vec!["KXNBAGAME-24NOV05LALBOS-Y".to_string()]);
        let p = gs.implied_probability("KXNBAGAME-24NOV05LALBOS-Y").unwrap();
        assert_eq!(p, Decimal::new(43, 2) * Decimal::from(10)); // 0.43
    }

    #[test]
    fn missing_book_has_no_implied_prob() {
        let g = game();
        let gs = GameState::new(&g);
        assert!(gs.implied_probability("nope").is_none());
    }

    #[test]
    fn load_unload_load_yields_equal_content() {
        // spec §8: "Load -> Unload -> Load of the same game yields a
        // GameState whose content (excluding monotonic timestamps) equals
        // a fresh load."
        let g = game();
        let first = GameState::new(&g);
        let second = GameState::new(&g);
        assert_eq!(first.game_id, second.game_id);
        assert_eq!(first.event_ticker, second.event_ticker);
        assert_eq!(first.phase, second.phase);
        assert_eq!(first.orderbooks.len(), second.orderbooks.len());
        assert_eq!(first.odds.len(), second.odds.len());
    }
}
