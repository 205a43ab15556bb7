//! Correlation (spec §4.5.5): exploits arithmetic inconsistencies between
//! related markets of the same game — the complementary home/away
//! moneyline sum, and moneyline-implied vs. actual spread pricing.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::gamestate::GameState;
use crate::model::{Side, StrategyId, StrategyKind, TradeSignal};
use crate::ticker::{self, MarketSuffix};

use super::common::{build_signal, CooldownMap, EvalContext, SignalRing, Strategy};
use super::config::CorrelationConfig;

pub struct CorrelationStrategy {
    id: StrategyId,
    enabled: bool,
    config: CorrelationConfig,
    cooldowns: CooldownMap,
    signals: SignalRing,
}

impl CorrelationStrategy {
    pub fn new(id: StrategyId, config: CorrelationConfig) -> Self {
        Self { id, enabled: true, config, cooldowns: CooldownMap::default(), signals: SignalRing::default() }
    }

    /// Check A: home_yes + away_yes should sum to ~100 (mutually exclusive,
    /// exhaustive outcomes). A sum above `complementary_max_sum` means both
    /// markets are simultaneously overpriced on Yes.
    fn check_complementary(&mut self, game: &GameState, ctx: &EvalContext) -> Option<TradeSignal> {
        let home_ticker = game.orderbooks.keys().find(|t| {
            matches!(ticker::parse_market_ticker(t).map(|m| m.suffix), Ok(MarketSuffix::MoneylineYes))
        })?;
        let away_ticker = game.orderbooks.keys().find(|t| {
            matches!(ticker::parse_market_ticker(t).map(|m| m.suffix), Ok(MarketSuffix::AwayMoneylineYes))
        })?;

        if self.cooldowns.is_cooling_down(home_ticker, ctx.now) && self.cooldowns.is_cooling_down(away_ticker, ctx.now)
        {
            return None;
        }

        let home_ob = game.orderbook(home_ticker)?;
        let away_ob = game.orderbook(away_ticker)?;
        let home_yes = home_ob.yes_mid_cents()?;
        let away_yes = away_ob.yes_mid_cents()?;
        let sum_pct = home_yes + away_yes;

        if sum_pct <= self.config.complementary_max_sum {
            return None;
        }

        let (overvalued_ticker, _overvalued_price) =
            if home_yes >= away_yes { (home_ticker.clone(), home_yes) } else { (away_ticker.clone(), away_yes) };

        self.cooldowns.mark(&overvalued_ticker, ctx.now, self.config.cooldown_minutes);

        Some(build_signal(
            self.id,
            StrategyKind::Correlation,
            game.game_id,
            &overvalued_ticker,
            Side::No,
            self.config.position_size,
            ((sum_pct - self.config.complementary_max_sum) / dec!(10)).clamp(Decimal::ZERO, Decimal::ONE),
            format!("complementary sum {sum_pct}% exceeds {}%", self.config.complementary_max_sum),
            serde_json::json!({
                "home_yes_cents": home_yes.to_string(),
                "away_yes_cents": away_yes.to_string(),
                "sum_pct": sum_pct.to_string(),
            }),
            ctx.now,
        ))
    }

    /// Check B: for each spread market tied to the favored team, compare
    /// its actual implied Yes probability against a linear approximation
    /// derived from the moneyline probability. This approximation is a
    /// documented placeholder (spec §9 REDESIGN FLAGS): its signals carry
    /// capped confidence.
    fn check_moneyline_spread(&mut self, game: &GameState, ctx: &EvalContext) -> Vec<TradeSignal> {
        let Some(home_ml_ticker) = game
            .orderbooks
            .keys()
            .find(|t| matches!(ticker::parse_market_ticker(t).map(|m| m.suffix), Ok(MarketSuffix::MoneylineYes)))
            .cloned()
        else {
            return Vec::new();
        };
        let Some(ml_prob_pct) = game.orderbook(&home_ml_ticker).and_then(|ob| ob.yes_mid_cents()) else {
            return Vec::new();
        };
        let expected_spread_prob_pct = dec!(50) + (ml_prob_pct - dec!(50)) * dec!(0.5);

        let spread_tickers: Vec<String> = game
            .orderbooks
            .keys()
            .filter(|t| matches!(ticker::parse_market_ticker(t).map(|m| m.suffix), Ok(MarketSuffix::Spread { .. })))
            .cloned()
            .collect();

        let mut out = Vec::new();
        for ticker_str in spread_tickers {
            if self.cooldowns.is_cooling_down(&ticker_str, ctx.now) {
                continue;
            }
            let Some(actual) = game.orderbook(&ticker_str).and_then(|ob| ob.yes_mid_cents()) else {
                continue;
            };
            let discrepancy = (actual - expected_spread_prob_pct).abs();
            if discrepancy < self.config.min_discrepancy_percent {
                continue;
            }
            let side = if actual < expected_spread_prob_pct { Side::Yes } else { Side::No };

            self.cooldowns.mark(&ticker_str, ctx.now, self.config.cooldown_minutes);

            out.push(build_signal(
                self.id,
                StrategyKind::Correlation,
                game.game_id,
                &ticker_str,
                side,
                self.config.position_size,
                dec!(0.5), // linear approximation: capped confidence, see module doc
                format!("moneyline-implied spread discrepancy {discrepancy}%"),
                serde_json::json!({
                    "expected_spread_prob_pct": expected_spread_prob_pct.to_string(),
                    "actual_spread_prob_pct": actual.to_string(),
                    "approximation": "linear_placeholder",
                }),
                ctx.now,
            ));
        }
        out
    }
}

impl Strategy for CorrelationStrategy {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Correlation
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn evaluate(&mut self, game: &GameState, ctx: &EvalContext) -> Vec<TradeSignal> {
        let mut out = Vec::new();
        if self.config.check_complementary {
            if let Some(signal) = self.check_complementary(game, ctx) {
                out.push(signal);
            }
        }
        if self.config.check_moneyline_spread {
            out.extend(self.check_moneyline_spread(game, ctx));
        }
        for s in &out {
            self.signals.push(s.clone());
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

    #[test]
    fn s6_scenario_overvalued_complementary_emits_no_on_home() {
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
        let home_ticker = "KXNBAGAME-24NOV05LALBOS-Y".to_string();
        let away_ticker = "KXNBAGAME-24NOV05LALBOS-AWAY-Y".to_string();

        let mut home_ob = OrderbookState::empty(Utc::now());
        home_ob.yes_bid = Some(54);
        home_ob.yes_ask = Some(56);
        gs.apply_orderbook(&home_ticker, home_ob);

        let mut away_ob = OrderbookState::empty(Utc::now());
        away_ob.yes_bid = Some(51);
        away_ob.yes_ask = Some(53);
        gs.apply_orderbook(&away_ticker, away_ob);

        let mut strat = CorrelationStrategy::new(StrategyId::new(), CorrelationConfig::default());
        let ctx = EvalContext { now: Utc::now(), bankroll_units: Decimal::from(10000) };
        let signals = strat.evaluate(&gs, &ctx);
        assert!(signals.iter().any(|s| s.market_ticker == home_ticker && s.side == Side::No));
    }
}
