//! RiskGate (C6, spec §4.6): the sole arbiter of whether a signal-derived
//! order may fill. Owns the single [`RiskAccount`] for this paper-trading
//! instance and applies its eight ordered limit checks, short-circuiting
//! on the first failure.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::RiskPolicyConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{Position, RiskAccount, SimulatedOrder};
use crate::ticker;

pub struct RiskGate {
    policy: RiskPolicyConfig,
    account: Mutex<RiskAccount>,
}

impl RiskGate {
    pub fn new(policy: RiskPolicyConfig, now: DateTime<Utc>) -> Self {
        Self { policy, account: Mutex::new(RiskAccount::new(now)) }
    }

    pub fn snapshot(&self) -> RiskAccount {
        self.account.lock().clone()
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut account = self.account.lock();
        account.enabled = enabled;
        info!(enabled, "risk gate enable flag changed");
    }

    /// Eight ordered checks, short-circuiting on first failure (spec §4.6).
    /// While disabled, always returns `Ok(())` — `record` still accrues.
    pub fn check(&self, order: &SimulatedOrder, positions: &[Position], now: DateTime<Utc>) -> EngineResult<()> {
        let mut account = self.account.lock();
        self.maybe_reset(&mut account, now);

        if !account.enabled {
            return Ok(());
        }

        // 1. cooldown
        if account.consecutive_losses >= self.policy.loss_streak_cooldown {
            if let Some(until) = account.cooldown_until {
                if now < until {
                    return Err(reject("loss_streak_cooldown", now.to_rfc3339(), until.to_rfc3339(), "cooling down after consecutive losses"));
                }
            }
        }

        let game_key = ticker::parse_market_ticker(&order.market_ticker)
            .ok()
            .map(|m| format!("{}{}{}", m.event.date, m.event.away, m.event.home));

        // 2. max_contracts_per_market
        let market_qty: i64 = positions
            .iter()
            .filter(|p| p.is_open && p.market_ticker == order.market_ticker && p.side == order.side)
            .map(|p| p.quantity)
            .sum();
        if market_qty + order.quantity > self.policy.max_contracts_per_market {
            return Err(reject(
                "max_contracts_per_market",
                (market_qty + order.quantity).to_string(),
                self.policy.max_contracts_per_market.to_string(),
                "order would exceed per-market contract limit",
            ));
        }

        // 3. max_contracts_per_game
        if let Some(ref key) = game_key {
            let game_qty: i64 = positions
                .iter()
                .filter(|p| p.is_open && same_game(&p.market_ticker, key))
                .map(|p| p.quantity)
                .sum();
            if game_qty + order.quantity > self.policy.max_contracts_per_game {
                return Err(reject(
                    "max_contracts_per_game",
                    (game_qty + order.quantity).to_string(),
                    self.policy.max_contracts_per_game.to_string(),
                    "order would exceed per-game contract limit",
                ));
            }
        }

        // 4. max_total_contracts
        let total_qty: i64 = positions.iter().filter(|p| p.is_open).map(|p| p.quantity).sum();
        if total_qty + order.quantity > self.policy.max_total_contracts {
            return Err(reject(
                "max_total_contracts",
                (total_qty + order.quantity).to_string(),
                self.policy.max_total_contracts.to_string(),
                "order would exceed total contract limit",
            ));
        }

        // 5. max_per_trade_risk
        let trade_risk = Decimal::from(order.quantity) * self.policy.worst_case_loss_cents;
        if trade_risk > self.policy.max_per_trade_risk {
            return Err(reject(
                "max_per_trade_risk",
                trade_risk.to_string(),
                self.policy.max_per_trade_risk.to_string(),
                "order's worst-case loss exceeds per-trade risk limit",
            ));
        }

        // 6. exposure limits (worst-case cents across open contracts)
        let order_exposure = trade_risk;
        let game_exposure: Decimal = game_key
            .as_ref()
            .map(|key| {
                positions
                    .iter()
                    .filter(|p| p.is_open && same_game(&p.market_ticker, key))
                    .map(|p| Decimal::from(p.quantity) * self.policy.worst_case_loss_cents)
                    .sum()
            })
            .unwrap_or(Decimal::ZERO);
        if game_exposure + order_exposure > self.policy.max_exposure_per_game {
            return Err(reject(
                "max_exposure_per_game",
                (game_exposure + order_exposure).to_string(),
                self.policy.max_exposure_per_game.to_string(),
                "order would exceed per-game exposure limit",
            ));
        }

        let strategy_exposure: Decimal = positions
            .iter()
            .filter(|p| p.is_open && p.strategy_id == order.strategy_id)
            .map(|p| Decimal::from(p.quantity) * self.policy.worst_case_loss_cents)
            .sum();
        if strategy_exposure + order_exposure > self.policy.max_exposure_per_strategy {
            return Err(reject(
                "max_exposure_per_strategy",
                (strategy_exposure + order_exposure).to_string(),
                self.policy.max_exposure_per_strategy.to_string(),
                "order would exceed per-strategy exposure limit",
            ));
        }

        let total_exposure: Decimal = positions
            .iter()
            .filter(|p| p.is_open)
            .map(|p| Decimal::from(p.quantity) * self.policy.worst_case_loss_cents)
            .sum();
        if total_exposure + order_exposure > self.policy.max_total_exposure {
            return Err(reject(
                "max_total_exposure",
                (total_exposure + order_exposure).to_string(),
                self.policy.max_total_exposure.to_string(),
                "order would exceed total exposure limit",
            ));
        }

        // 7. order-rate limits
        if account.orders_today + 1 > self.policy.max_orders_per_day {
            return Err(reject(
                "max_orders_per_day",
                (account.orders_today + 1).to_string(),
                self.policy.max_orders_per_day.to_string(),
                "daily order count limit reached",
            ));
        }
        let hour_count = account.orders_this_hour.iter().filter(|t| **t > now - chrono::Duration::hours(1)).count() as u32;
        if hour_count + 1 > self.policy.max_orders_per_hour {
            return Err(reject(
                "max_orders_per_hour",
                (hour_count + 1).to_string(),
                self.policy.max_orders_per_hour.to_string(),
                "hourly order count limit reached",
            ));
        }

        // 8. daily/weekly loss limits
        if account.daily_loss + trade_risk > self.policy.max_daily_loss {
            return Err(reject(
                "max_daily_loss",
                account.daily_loss.to_string(),
                self.policy.max_daily_loss.to_string(),
                "order's worst-case loss would breach the daily loss limit",
            ));
        }
        if account.weekly_loss + trade_risk > self.policy.max_weekly_loss {
            return Err(reject(
                "max_weekly_loss",
                account.weekly_loss.to_string(),
                self.policy.max_weekly_loss.to_string(),
                "order's worst-case loss would breach the weekly loss limit",
            ));
        }

        Ok(())
    }

    /// Records an order's effect on the rolling counters. `realized_delta`
    /// is zero on open; the realized P&L delta on close/settle.
    pub fn record(&self, now: DateTime<Utc>, realized_delta: Decimal) {
        let mut account = self.account.lock();
        self.maybe_reset(&mut account, now);

        account.orders_today += 1;
        account.orders_this_hour.push(now);
        account.orders_this_hour.retain(|t| *t > now - chrono::Duration::hours(1));

        if realized_delta < Decimal::ZERO {
            account.daily_loss -= realized_delta;
            account.weekly_loss -= realized_delta;
            account.consecutive_losses += 1;
            if account.consecutive_losses >= self.policy.loss_streak_cooldown {
                account.cooldown_until = Some(now + chrono::Duration::minutes(self.policy.cooldown_minutes));
                warn!(consecutive_losses = account.consecutive_losses, "risk gate entering loss-streak cooldown");
            }
        } else if realized_delta > Decimal::ZERO {
            account.consecutive_losses = 0;
        }
    }

    fn maybe_reset(&self, account: &mut RiskAccount, now: DateTime<Utc>) {
        if now >= account.daily_reset_at {
            account.daily_loss = Decimal::ZERO;
            account.orders_today = 0;
            account.daily_reset_at = crate::model::risk_account::next_utc_midnight(now);
        }
        if now >= account.weekly_reset_at {
            account.weekly_loss = Decimal::ZERO;
            account.weekly_reset_at = crate::model::risk_account::next_utc_monday_midnight(now);
        }
    }
}

fn same_game(market_ticker: &str, game_key: &str) -> bool {
    ticker::parse_market_ticker(market_ticker)
        .ok()
        .map(|m| format!("{}{}{}", m.event.date, m.event.away, m.event.home))
        .as_deref()
        == Some(game_key)
}

fn reject(limit_type: &str, current: String, limit: String, reason: &str) -> EngineError {
    EngineError::RiskRejection { limit_type: limit_type.to_string(), current, limit, reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderKind, OrderStatus, Side, StrategyId};
    use clap::Parser;

    fn order(quantity: i64, ticker: &str) -> SimulatedOrder {
        SimulatedOrder {
            id: crate::model::OrderId::new(),
            strategy_id: StrategyId::new(),
            market_ticker: ticker.to_string(),
            side: Side::Yes,
            quantity,
            kind: OrderKind::Market,
            limit_price: None,
            fill_price: None,
            status: OrderStatus::Pending,
            placed_at: Utc::now(),
            filled_at: None,
            reject_reason: None,
            signal_snapshot: serde_json::json!({}),
        }
    }

    #[test]
    fn approves_within_limits() {
        let policy = RiskPolicyConfig::parse_from(["test"]);
        let gate = RiskGate::new(policy, Utc::now());
        let order = order(10, "KXNBAGAME-24NOV05LALBOS-Y");
        assert!(gate.check(&order, &[], Utc::now()).is_ok());
    }

    #[test]
    fn rejects_over_per_market_limit() {
        let policy = RiskPolicyConfig::parse_from(["test"]);
        let gate = RiskGate::new(policy, Utc::now());
        let order = order(200, "KXNBAGAME-24NOV05LALBOS-Y");
        let err = gate.check(&order, &[], Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::RiskRejection { ref limit_type, .. } if limit_type == "max_contracts_per_market"));
    }

    #[test]
    fn disabled_gate_always_approves() {
        let policy = RiskPolicyConfig::parse_from(["test"]);
        let gate = RiskGate::new(policy, Utc::now());
        gate.set_enabled(false);
        let order = order(999, "KXNBAGAME-24NOV05LALBOS-Y");
        assert!(gate.check(&order, &[], Utc::now()).is_ok());
    }

    #[test]
    fn loss_streak_triggers_cooldown() {
        let policy = RiskPolicyConfig::parse_from(["test"]);
        let gate = RiskGate::new(policy.clone(), Utc::now());
        let now = Utc::now();
        for _ in 0..policy.loss_streak_cooldown {
            gate.record(now, Decimal::from(-10));
        }
        let order = order(1, "KXNBAGAME-24NOV05LALBOS-Y");
        let err = gate.check(&order, &[], now).unwrap_err();
        assert!(matches!(err, EngineError::RiskRejection { ref limit_type, .. } if limit_type == "loss_streak_cooldown"));
    }

    #[test]
    fn same_game_matches_home_and_away_markets() {
        assert!(same_game(
            "KXNBAGAME-24NOV05LALBOS-AWAY-Y",
            &format!("{}{}{}", chrono::NaiveDate::from_ymd_opt(2024, 11, 5).unwrap(), "LAL", "BOS")
        ));
    }
}
