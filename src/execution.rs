//! ExecutionEngine (C7, spec §4.7): turns an approved [`TradeSignal`] into
//! a [`SimulatedOrder`], fills it against the current orderbook, and
//! maintains the position book that is the sole source of realized and
//! unrealized P&L.
//!
//! The position book is single-writer (spec §3 "ExecutionEngine
//! exclusively owns the position book"): every mutation goes through a
//! `parking_lot::Mutex<HashMap<...>>`, mirroring the same discipline
//! `RiskGate` uses for its `RiskAccount`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::aggregator::Aggregator;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    GameId, OrderId, OrderKind, OrderStatus, Position, Side, SimulatedOrder, StrategyId, TradeSignal,
};
use crate::risk::RiskGate;
use crate::storage::Storage;
use crate::strategy::SignalHandler;

type PositionKey = (StrategyId, String, Side);

/// Invoked after a fill or position update has been durably persisted.
/// Callback failures are logged, never rolled back (spec §4.7 "Execution
/// callbacks").
pub trait ExecutionCallback: Send + Sync {
    fn on_fill(&self, _order: &SimulatedOrder) {}
    fn on_position_update(&self, _position: &Position) {}
}

pub struct ExecutionEngine {
    aggregator: Arc<Aggregator>,
    risk: Arc<RiskGate>,
    storage: Storage,
    positions: Mutex<HashMap<PositionKey, Position>>,
    callbacks: Mutex<Vec<Arc<dyn ExecutionCallback>>>,
}

impl ExecutionEngine {
    pub fn new(aggregator: Arc<Aggregator>, risk: Arc<RiskGate>, storage: Storage) -> Arc<Self> {
        Arc::new(Self {
            aggregator,
            risk,
            storage,
            positions: Mutex::new(HashMap::new()),
            callbacks: Mutex::new(Vec::new()),
        })
    }

    pub fn register_callback(&self, callback: Arc<dyn ExecutionCallback>) {
        self.callbacks.lock().push(callback);
    }

    /// Rehydrates the position book from the persisted order log (spec §4.7
    /// "positions can be reconstructed from orders by replay", §8 "Replay
    /// of the persisted order log... reconstructs the position book
    /// exactly"). Call once at startup, before any signal is processed.
    pub fn rebuild_from_storage(&self) -> anyhow::Result<()> {
        let orders = self.storage.rebuild_positions_from_orders()?;
        let mut positions = self.positions.lock();
        positions.clear();
        for order in &orders {
            apply_fill_to_book(&mut positions, order);
        }
        info!(rebuilt = orders.len(), "execution engine rebuilt position book from order log");
        Ok(())
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.positions.lock().values().filter(|p| p.is_open).cloned().collect()
    }

    pub fn position(&self, strategy_id: StrategyId, market_ticker: &str, side: Side) -> Option<Position> {
        self.positions.lock().get(&(strategy_id, market_ticker.to_string(), side)).cloned()
    }

    /// Execution protocol, spec §4.7 steps 1-7.
    pub async fn execute_signal(&self, signal: &TradeSignal) -> EngineResult<SimulatedOrder> {
        let now = signal.emitted_at;
        let kind = if signal.metadata.get("limit_price").is_some() {
            OrderKind::Limit
        } else {
            OrderKind::Market
        };
        let limit_price = signal
            .metadata
            .get("limit_price")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let mut order = SimulatedOrder {
            id: OrderId::new(),
            strategy_id: signal.strategy_id,
            market_ticker: signal.market_ticker.clone(),
            side: signal.side,
            quantity: signal.quantity,
            kind,
            limit_price,
            fill_price: None,
            status: OrderStatus::Pending,
            placed_at: now,
            filled_at: None,
            reject_reason: None,
            signal_snapshot: serde_json::to_value(signal).unwrap_or(serde_json::Value::Null),
        };

        // Step 2: fetch current orderbook for the signal's market.
        let Some(ob) = self.aggregator.get_state(signal.game_id).and_then(|gs| gs.orderbook(&signal.market_ticker)) else {
            order.status = OrderStatus::Rejected;
            order.reject_reason = Some("no orderbook data for market".to_string());
            self.persist_rejected(&order, signal.game_id)?;
            return Err(EngineError::DataUnavailable(format!(
                "no orderbook state for {}",
                signal.market_ticker
            )));
        };

        // Step 3: determine fill price. Buying Yes fills at yes_ask; buying
        // No fills at no_ask.
        let Some(ask) = (match signal.side {
            Side::Yes => ob.yes_ask,
            Side::No => ob.no_ask,
        }) else {
            order.status = OrderStatus::Rejected;
            order.reject_reason = Some("ask side undefined".to_string());
            self.persist_rejected(&order, signal.game_id)?;
            return Err(EngineError::DataUnavailable(format!(
                "no ask price for {} {:?}",
                signal.market_ticker, signal.side
            )));
        };

        if order.kind == OrderKind::Limit {
            let limit = order.limit_price.expect("limit order carries limit_price");
            if ask > limit {
                // Paper-trading simplification: a limit order that doesn't
                // immediately cross stays Pending and is never retried
                // (spec §4.7 step 3, §9 open question — a real
                // implementation should add a resting-order book).
                self.storage.insert_order(&order, None).map_err(|e| {
                    EngineError::InvariantViolation(format!("persisting pending limit order: {e}"))
                })?;
                return Ok(order);
            }
        }

        // Step 4: risk check.
        let open_positions = self.open_positions();
        if let Err(e) = self.risk.check(&order, &open_positions, now) {
            order.status = OrderStatus::Rejected;
            order.reject_reason = Some(e.to_string());
            warn!(ticker = %order.market_ticker, reason = %e, "order rejected by risk gate");
            self.persist_rejected(&order, signal.game_id)?;
            return Err(e);
        }

        // Step 5: fill.
        order.fill_price = Some(Decimal::from(ask));
        order.filled_at = Some(now);
        order.status = OrderStatus::Filled;

        // Step 6: apply to position book, record with zero realized delta
        // (this is an open/add, never a close — see signal->order mapping
        // rule in spec §4.7).
        let position_after = {
            let mut positions = self.positions.lock();
            apply_fill_to_book(&mut positions, &order);
            positions
                .get(&(order.strategy_id, order.market_ticker.clone(), order.side))
                .cloned()
        };
        self.risk.record(now, Decimal::ZERO);

        // Step 7: persist order, then upsert position. Idempotent upserts
        // mean a crash between the two is recoverable by replay (spec
        // §4.7 step 7).
        if let Err(e) = self.storage.insert_order(&order, None) {
            error!(error = %e, "failed to persist filled order; halting further executions for this call");
            return Err(EngineError::InvariantViolation(format!("order persistence failed: {e}")));
        }
        if let Some(ref position) = position_after {
            if let Err(e) = self.storage.upsert_position(position) {
                error!(error = %e, "failed to persist position after fill; order is recorded, position is not");
                return Err(EngineError::InvariantViolation(format!("position persistence failed: {e}")));
            }
        }

        self.run_callbacks(&order, position_after.as_ref());
        info!(ticker = %order.market_ticker, side = ?order.side, qty = order.quantity, price = ?order.fill_price, "order filled");
        Ok(order)
    }

    /// Close an open position at `exit_price`, or the current best-exit
    /// price (yes_bid for Yes, no_bid for No) if not given (spec §4.7
    /// "Close_position").
    pub fn close_position(
        &self,
        strategy_id: StrategyId,
        market_ticker: &str,
        game_id: GameId,
        exit_price: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<Position>> {
        let exit = match exit_price {
            Some(p) => Some(p),
            None => self.best_exit_price(game_id, market_ticker),
        };
        let Some(exit) = exit else {
            return Err(EngineError::DataUnavailable(format!("no exit price available for {market_ticker}")));
        };

        let mut positions = self.positions.lock();
        let mut closed = None;
        for (key, position) in positions.iter_mut() {
            if key.0 != strategy_id || key.1 != market_ticker || !position.is_open {
                continue;
            }
            let realized_delta = (exit - position.avg_price) * Decimal::from(position.quantity);
            position.realized_pnl += realized_delta;
            position.quantity = 0;
            position.is_open = false;
            position.closed_at = Some(now);
            closed = Some((position.clone(), realized_delta));
        }
        drop(positions);

        if let Some((position, realized_delta)) = closed {
            self.risk.record(now, realized_delta);
            self.storage
                .upsert_position(&position)
                .map_err(|e| EngineError::InvariantViolation(format!("persisting closed position: {e}")))?;
            self.run_callbacks_position(&position);
            Ok(Some(position))
        } else {
            Ok(None)
        }
    }

    /// Assign the fixed payout once the underlying outcome is known (spec
    /// §4.7 "Settle_position"). `outcome` is the side that paid 100 cents.
    pub fn settle_position(
        &self,
        strategy_id: StrategyId,
        market_ticker: &str,
        outcome: Side,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<Position>> {
        let mut positions = self.positions.lock();
        let mut settled = None;
        for (key, position) in positions.iter_mut() {
            if key.0 != strategy_id || key.1 != market_ticker || !position.is_open {
                continue;
            }
            let payout_per_contract = if position.side == outcome { Decimal::from(100) } else { Decimal::ZERO };
            let realized_delta = (payout_per_contract - position.avg_price) * Decimal::from(position.quantity);
            position.realized_pnl += realized_delta;
            position.quantity = 0;
            position.is_open = false;
            position.closed_at = Some(now);
            settled = Some((position.clone(), realized_delta));
        }
        drop(positions);

        if let Some((position, realized_delta)) = settled {
            self.risk.record(now, realized_delta);
            self.storage
                .upsert_position(&position)
                .map_err(|e| EngineError::InvariantViolation(format!("persisting settled position: {e}")))?;
            self.run_callbacks_position(&position);
            Ok(Some(position))
        } else {
            Ok(None)
        }
    }

    /// Mark every open position to its current best-exit price and
    /// recompute `unrealized_pnl` (spec §4.7 "Mark-to-market"). Returns
    /// the positions that were updated.
    pub fn update_unrealized(&self, game_lookup: impl Fn(&str) -> Option<GameId>) -> Vec<Position> {
        let mut updated = Vec::new();
        let mut positions = self.positions.lock();
        for position in positions.values_mut() {
            if !position.is_open {
                continue;
            }
            let Some(game_id) = game_lookup(&position.market_ticker) else { continue };
            let Some(ob) = self.aggregator.get_state(game_id).and_then(|gs| gs.orderbook(&position.market_ticker)) else {
                continue;
            };
            let mark = match position.side {
                Side::Yes => ob.yes_bid,
                Side::No => ob.no_bid,
            };
            let Some(mark) = mark else { continue };
            let mark = Decimal::from(mark);
            position.current_price = Some(mark);
            position.unrealized_pnl = (mark - position.avg_price) * Decimal::from(position.quantity);
            updated.push(position.clone());
        }
        drop(positions);

        for position in &updated {
            if let Err(e) = self.storage.upsert_position(position) {
                warn!(error = %e, ticker = %position.market_ticker, "failed to persist mark-to-market update");
            }
        }
        updated
    }

    /// Best-exit price for whichever side is currently held on
    /// `market_ticker` (yes_bid for a Yes position, no_bid for a No
    /// position), spec §4.7 "Close_position".
    fn best_exit_price(&self, game_id: GameId, market_ticker: &str) -> Option<Decimal> {
        let side = self.positions.lock().iter().find(|(k, _)| k.1 == market_ticker).map(|(_, p)| p.side)?;
        let gs = self.aggregator.get_state(game_id)?;
        let ob = gs.orderbook(market_ticker)?;
        let price = match side {
            Side::Yes => ob.yes_bid,
            Side::No => ob.no_bid,
        }?;
        Some(Decimal::from(price))
    }

    fn persist_rejected(&self, order: &SimulatedOrder, _game_id: GameId) -> EngineResult<()> {
        self.storage
            .insert_order(order, None)
            .map_err(|e| EngineError::InvariantViolation(format!("persisting rejected order: {e}")))
    }

    fn run_callbacks(&self, order: &SimulatedOrder, position: Option<&Position>) {
        let callbacks = self.callbacks.lock().clone();
        for cb in &callbacks {
            cb.on_fill(order);
            if let Some(position) = position {
                cb.on_position_update(position);
            }
        }
    }

    fn run_callbacks_position(&self, position: &Position) {
        let callbacks = self.callbacks.lock().clone();
        for cb in &callbacks {
            cb.on_position_update(position);
        }
    }
}

/// Open/add arithmetic (spec §4.7 "Position arithmetic"): new_qty =
/// old_qty + qty; new_avg = (old_qty*old_avg + qty*fill) / new_qty. Only
/// applied to `Filled` orders; skips anything else (rejected/pending
/// orders never touch the book, and a replay over the order log only
/// selects filled rows to begin with).
fn apply_fill_to_book(positions: &mut HashMap<PositionKey, Position>, order: &SimulatedOrder) {
    if order.status != OrderStatus::Filled {
        return;
    }
    let Some(fill_price) = order.fill_price else { return };
    let key = (order.strategy_id, order.market_ticker.clone(), order.side);
    let now = order.filled_at.unwrap_or(order.placed_at);

    positions
        .entry(key)
        .and_modify(|p| {
            let new_qty = p.quantity + order.quantity;
            if new_qty > 0 {
                p.avg_price = (Decimal::from(p.quantity) * p.avg_price + Decimal::from(order.quantity) * fill_price)
                    / Decimal::from(new_qty);
            }
            p.quantity = new_qty;
            p.is_open = true;
        })
        .or_insert_with(|| Position {
            strategy_id: order.strategy_id,
            market_ticker: order.market_ticker.clone(),
            side: order.side,
            quantity: order.quantity,
            avg_price: fill_price,
            current_price: None,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            is_open: true,
            opened_at: now,
            closed_at: None,
        });
}

#[async_trait]
impl SignalHandler for ExecutionEngine {
    async fn handle(&self, signal: TradeSignal) {
        match self.execute_signal(&signal).await {
            Ok(order) if order.status == OrderStatus::Rejected => {
                info!(ticker = %order.market_ticker, reason = ?order.reject_reason, "signal produced a rejected order");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(ticker = %signal.market_ticker, error = %e, "signal execution failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskPolicyConfig;
    use crate::model::StrategyKind;
    use crate::sportsfeed::SportsFeedClient;
    use clap::Parser;
    use std::time::Duration;

    fn engine() -> Arc<ExecutionEngine> {
        let exchange = crate::exchange::ExchangeStream::spawn(
            "ws://localhost:0".to_string(),
            Arc::new(crate::signing::StaticKey::new("test")),
        );
        let sportsfeed = Arc::new(
            SportsFeedClient::new("http://localhost:0".to_string(), Arc::new(crate::signing::StaticKey::new("test")))
                .unwrap(),
        );
        let aggregator = Aggregator::new(exchange, sportsfeed, Duration::from_secs(5), Duration::from_secs(10));
        let policy = RiskPolicyConfig::parse_from(["test"]);
        let risk = Arc::new(RiskGate::new(policy, Utc::now()));
        let storage = Storage::open_in_memory().unwrap();
        ExecutionEngine::new(aggregator, risk, storage)
    }

    fn signal(game_id: GameId, ticker: &str, side: Side, qty: i64) -> TradeSignal {
        TradeSignal {
            strategy_id: StrategyId::new(),
            strategy_kind: StrategyKind::SharpLine,
            game_id,
            market_ticker: ticker.to_string(),
            side,
            quantity: qty,
            confidence: Decimal::new(8, 1),
            reason: "test".to_string(),
            metadata: serde_json::json!({}),
            emitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rejects_with_no_market_data() {
        let engine = engine();
        let sig = signal(GameId::new(), "KXNBAGAME-24NOV05LALBOS-Y", Side::Yes, 10);
        let err = engine.execute_signal(&sig).await.unwrap_err();
        assert!(matches!(err, EngineError::DataUnavailable(_)));
    }

    #[test]
    fn settlement_matches_spec_scenario_s4() {
        // spec.md S4: qty=10, avg_price=45, Settle(Yes) -> realized_pnl += 550.
        let mut positions = HashMap::new();
        let strategy_id = StrategyId::new();
        let key = (strategy_id, "KXNBAGAME-24NOV05LALBOS-Y".to_string(), Side::Yes);
        positions.insert(
            key.clone(),
            Position {
                strategy_id,
                market_ticker: "KXNBAGAME-24NOV05LALBOS-Y".to_string(),
                side: Side::Yes,
                quantity: 10,
                avg_price: Decimal::from(45),
                current_price: None,
                unrealized_pnl: Decimal::ZERO,
                realized_pnl: Decimal::ZERO,
                is_open: true,
                opened_at: Utc::now(),
                closed_at: None,
            },
        );
        let position = positions.get_mut(&key).unwrap();
        let payout = Decimal::from(100);
        let realized_delta = (payout - position.avg_price) * Decimal::from(position.quantity);
        position.realized_pnl += realized_delta;
        assert_eq!(position.realized_pnl, Decimal::from(550));
    }

    #[test]
    fn open_add_averages_price() {
        let mut positions = HashMap::new();
        let order1 = SimulatedOrder {
            id: OrderId::new(),
            strategy_id: StrategyId::new(),
            market_ticker: "T-Y".to_string(),
            side: Side::Yes,
            quantity: 10,
            kind: OrderKind::Market,
            limit_price: None,
            fill_price: Some(Decimal::from(40)),
            status: OrderStatus::Filled,
            placed_at: Utc::now(),
            filled_at: Some(Utc::now()),
            reject_reason: None,
            signal_snapshot: serde_json::Value::Null,
        };
        let mut order2 = order1.clone();
        order2.id = OrderId::new();
        order2.fill_price = Some(Decimal::from(50));
        order2.quantity = 10;

        apply_fill_to_book(&mut positions, &order1);
        apply_fill_to_book(&mut positions, &order2);

        let key = (order1.strategy_id, "T-Y".to_string(), Side::Yes);
        let position = positions.get(&key).unwrap();
        assert_eq!(position.quantity, 20);
        assert_eq!(position.avg_price, Decimal::from(45));
    }

    #[test]
    fn non_filled_order_does_not_touch_book() {
        let mut positions = HashMap::new();
        let order = SimulatedOrder {
            id: OrderId::new(),
            strategy_id: StrategyId::new(),
            market_ticker: "T-Y".to_string(),
            side: Side::Yes,
            quantity: 10,
            kind: OrderKind::Market,
            limit_price: None,
            fill_price: None,
            status: OrderStatus::Rejected,
            placed_at: Utc::now(),
            filled_at: None,
            reject_reason: Some("test".to_string()),
            signal_snapshot: serde_json::Value::Null,
        };
        apply_fill_to_book(&mut positions, &order);
        assert!(positions.is_empty());
    }
}
