use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{OrderId, StrategyId};
use super::market::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected,
    Cancelled,
}

/// A simulated order built from a [`super::signal::TradeSignal`] (spec §3
/// "SimulatedOrder").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedOrder {
    pub id: OrderId,
    pub strategy_id: StrategyId,
    pub market_ticker: String,
    pub side: Side,
    pub quantity: i64,
    pub kind: OrderKind,
    pub limit_price: Option<i32>,
    pub fill_price: Option<Decimal>,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub reject_reason: Option<String>,
    /// Snapshot of the signal that produced this order, for replay (spec §8
    /// "Replay of the persisted order log... reconstructs the position
    /// book exactly").
    pub signal_snapshot: Value,
}
