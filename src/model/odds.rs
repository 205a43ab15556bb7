use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A sportsbook vendor name (e.g. "draftkings", "fanduel"). Kept as a
/// newtype string rather than an enum since the sports-data provider's
/// vendor roster is configuration, not a compile-time constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vendor(pub String);

impl Vendor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One vendor's odds for a game (spec §3 "OddsQuote").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsQuote {
    pub vendor: Vendor,
    pub moneyline_home: Option<i32>,
    pub moneyline_away: Option<i32>,
    pub spread_value: Option<Decimal>,
    pub spread_home_odds: Option<i32>,
    pub total_value: Option<Decimal>,
    pub over_odds: Option<i32>,
    pub under_odds: Option<i32>,
    pub last_update: DateTime<Utc>,
}
