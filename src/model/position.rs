use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::StrategyId;
use super::market::Side;

/// A position, uniquely keyed by (strategy_id, market_ticker, side)
/// (spec §3 "Position").
///
/// Invariant: when `is_open` is false, `quantity` is 0 and `realized_pnl`
/// is final (no further mutation). When `is_open` is true, `quantity` is
/// at least 1 and `0 <= avg_price <= 100` (spec §8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub strategy_id: StrategyId,
    pub market_ticker: String,
    pub side: Side,
    pub quantity: i64,
    pub avg_price: Decimal,
    pub current_price: Option<Decimal>,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub is_open: bool,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn key(&self) -> (StrategyId, String, Side) {
        (self.strategy_id, self.market_ticker.clone(), self.side)
    }

    pub fn satisfies_invariants(&self) -> bool {
        if self.is_open {
            self.quantity >= 1
                && self.avg_price >= Decimal::ZERO
                && self.avg_price <= Decimal::from(100)
        } else {
            self.quantity == 0
        }
    }
}
