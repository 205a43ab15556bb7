use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Process-wide accumulators for a single risk policy instance (spec §3
/// "RiskAccount"). Owned exclusively by [`crate::risk::RiskGate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAccount {
    pub daily_loss: Decimal,
    pub daily_reset_at: DateTime<Utc>,
    pub weekly_loss: Decimal,
    pub weekly_reset_at: DateTime<Utc>,
    pub orders_today: u32,
    /// (hour bucket start, count) — the rolling hourly window, truncated
    /// minute-by-minute per spec §4.6 "Resets".
    pub orders_this_hour: Vec<DateTime<Utc>>,
    pub consecutive_losses: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl RiskAccount {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            daily_loss: Decimal::ZERO,
            daily_reset_at: next_utc_midnight(now),
            weekly_loss: Decimal::ZERO,
            weekly_reset_at: next_utc_monday_midnight(now),
            orders_today: 0,
            orders_this_hour: Vec::new(),
            consecutive_losses: 0,
            cooldown_until: None,
            enabled: true,
        }
    }
}

pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = (now + chrono::Duration::days(1)).date_naive();
    tomorrow.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

pub fn next_utc_monday_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    use chrono::Weekday;
    let days_until_monday = {
        let today = now.weekday();
        let offset = (Weekday::Mon.num_days_from_monday() + 7
            - today.num_days_from_monday())
            % 7;
        if offset == 0 {
            7
        } else {
            offset
        }
    };
    let next_monday = (now + chrono::Duration::days(days_until_monday as i64)).date_naive();
    next_monday.and_hms_opt(0, 0, 0).unwrap().and_utc()
}
