use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{GameId, StrategyId};
use super::market::Side;

/// Which strategy kind emitted a signal. A fixed set of variants per
/// spec §9 "Dynamic class-based strategy registry → tagged variant".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SharpLine,
    Momentum,
    EvMultiBook,
    MeanReversion,
    Correlation,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::SharpLine => "sharp_line",
            StrategyKind::Momentum => "momentum",
            StrategyKind::EvMultiBook => "ev_multi_book",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::Correlation => "correlation",
        }
    }
}

/// A trade signal emitted by a strategy (spec §3 "TradeSignal").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub strategy_id: StrategyId,
    pub strategy_kind: StrategyKind,
    pub game_id: GameId,
    pub market_ticker: String,
    pub side: Side,
    pub quantity: i64,
    pub confidence: Decimal,
    pub reason: String,
    pub metadata: Value,
    pub emitted_at: DateTime<Utc>,
}
