//! Per-kind typed configuration with documented defaults (spec §4.5.1-5).
//! Every config exposes `default()`, doubling as the spec's
//! `get_default_config` hook.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharpLineConfig {
    pub threshold_percent: Decimal,
    pub min_sample_sportsbooks: usize,
    pub position_size: i64,
    pub cooldown_minutes: i64,
    pub min_ev_percent: Decimal,
    pub market_types: Vec<String>,
    pub use_kelly_sizing: bool,
    pub kelly_fraction: Decimal,
}

impl Default for SharpLineConfig {
    fn default() -> Self {
        Self {
            threshold_percent: dec!(5.0),
            min_sample_sportsbooks: 3,
            position_size: 10,
            cooldown_minutes: 5,
            min_ev_percent: dec!(2.0),
            market_types: vec!["moneyline".to_string()],
            use_kelly_sizing: false,
            kelly_fraction: dec!(0.25),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumConfig {
    pub lookback_seconds: i64,
    pub min_price_change_cents: i32,
    pub position_size: i64,
    pub cooldown_minutes: i64,
    pub max_spread_cents: i32,
    pub market_types: Vec<String>,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            lookback_seconds: 120,
            min_price_change_cents: 5,
            position_size: 10,
            cooldown_minutes: 3,
            max_spread_cents: 3,
            market_types: vec!["moneyline".to_string(), "spread".to_string(), "total".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvMultiBookConfig {
    pub min_ev_percent: Decimal,
    pub min_sportsbooks_agreeing: usize,
    pub position_size: i64,
    pub cooldown_minutes: i64,
    pub preferred_books: Vec<String>,
    pub exclude_books: Vec<String>,
    pub market_types: Vec<String>,
}

impl Default for EvMultiBookConfig {
    fn default() -> Self {
        Self {
            min_ev_percent: dec!(3.0),
            min_sportsbooks_agreeing: 2,
            position_size: 10,
            cooldown_minutes: 5,
            preferred_books: Vec::new(),
            exclude_books: Vec::new(),
            market_types: vec!["moneyline".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanReversionConfig {
    pub min_reversion_percent: Decimal,
    pub max_reversion_percent: Decimal,
    pub min_time_remaining_pct: Decimal,
    pub position_size: i64,
    pub cooldown_minutes: i64,
    pub only_first_half: bool,
    pub market_types: Vec<String>,
    pub max_score_deficit: i32,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            min_reversion_percent: dec!(15.0),
            max_reversion_percent: dec!(40.0),
            min_time_remaining_pct: dec!(25.0),
            position_size: 10,
            cooldown_minutes: 10,
            only_first_half: true,
            market_types: vec!["moneyline".to_string()],
            max_score_deficit: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    pub min_discrepancy_percent: Decimal,
    pub complementary_max_sum: Decimal,
    pub complementary_min_sum: Decimal,
    pub position_size: i64,
    pub cooldown_minutes: i64,
    pub check_complementary: bool,
    pub check_moneyline_spread: bool,
    pub prefer_no_on_overvalued: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_discrepancy_percent: dec!(5.0),
            complementary_max_sum: dec!(105.0),
            complementary_min_sum: dec!(95.0),
            position_size: 10,
            cooldown_minutes: 5,
            check_complementary: true,
            check_moneyline_spread: true,
            prefer_no_on_overvalued: true,
        }
    }
}
