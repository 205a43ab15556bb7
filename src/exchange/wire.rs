//! Exchange WebSocket wire types (spec §4.1).
//!
//! Mirrors the shape of a Kalshi-style market-data channel: a snapshot
//! carries the full two-sided book, a delta carries one price-level
//! change, and every message after the snapshot carries a monotonically
//! increasing `seq` the client uses to detect drops.

use serde::{Deserialize, Serialize};

use crate::model::Side;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClientCommand {
    Subscribe { tickers: Vec<String> },
    Unsubscribe { tickers: Vec<String> },
}

/// A price level: (price in cents, resting contract count).
pub type PriceLevel = (i32, i64);

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Snapshot(OrderbookSnapshot),
    Delta(OrderbookDelta),
    Ticker(TickerUpdate),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderbookSnapshot {
    pub market_ticker: String,
    pub seq: i64,
    #[serde(default)]
    pub yes: Vec<PriceLevel>,
    #[serde(default)]
    pub no: Vec<PriceLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderbookDelta {
    pub market_ticker: String,
    pub seq: i64,
    pub side: Side,
    pub price: i32,
    /// New resting size at this level (0 removes the level), not a delta
    /// quantity — the exchange sends absolute depth per level.
    pub size: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerUpdate {
    pub market_ticker: String,
    pub yes_bid: Option<i32>,
    pub yes_ask: Option<i32>,
}
