use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::GameId;

/// The two tradable sides of a binary market (spec GLOSSARY "Yes/No side").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

/// Market kind (spec §3 "Market").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketKind {
    MoneylineHome,
    MoneylineAway,
    Spread,
    Total,
}

impl MarketKind {
    pub fn is_moneyline(self) -> bool {
        matches!(self, MarketKind::MoneylineHome | MarketKind::MoneylineAway)
    }
}

/// A single tradable contract on the exchange, belonging to exactly one
/// game (spec §3 "Market").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub ticker: String,
    pub game_id: GameId,
    pub kind: MarketKind,
    /// Strike value for Spread/Total markets (e.g. the point spread number).
    pub strike: Option<Decimal>,
    pub side: Option<Side>,
}
