//! Matches an exchange event ticker to a sports-data scheduled game
//! (spec §4.2): same calendar date, same two team abbreviations,
//! case-folded. Ambiguity (more than one candidate matches) is reported
//! rather than guessed at.

use thiserror::Error;

use super::client::ScheduledGame;
use crate::ticker::EventTicker;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("no scheduled game matches ticker date {date} teams {away}/{home}")]
    NotFound { date: String, away: String, home: String },
    #[error("{count} scheduled games match ticker date {date} teams {away}/{home}")]
    Ambiguous { date: String, away: String, home: String, count: usize },
}

pub fn match_game<'a>(
    ticker: &EventTicker,
    candidates: &'a [ScheduledGame],
) -> Result<&'a ScheduledGame, MatchError> {
    let matches: Vec<&ScheduledGame> = candidates
        .iter()
        .filter(|g| {
            g.scheduled_start.date_naive() == ticker.date
                && g.away_team.eq_ignore_ascii_case(&ticker.away)
                && g.home_team.eq_ignore_ascii_case(&ticker.home)
        })
        .collect();

    match matches.len() {
        0 => Err(MatchError::NotFound {
            date: ticker.date.to_string(),
            away: ticker.away.clone(),
            home: ticker.home.clone(),
        }),
        1 => Ok(matches[0]),
        count => Err(MatchError::Ambiguous {
            date: ticker.date.to_string(),
            away: ticker.away.clone(),
            home: ticker.home.clone(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn game(away: &str, home: &str, date: (i32, u32, u32)) -> ScheduledGame {
        ScheduledGame {
            nba_game_id: format!("{away}{home}"),
            home_team: home.to_string(),
            away_team: away.to_string(),
            scheduled_start: Utc.with_ymd_and_hms(date.0, date.1, date.2, 19, 0, 0).unwrap(),
        }
    }

    #[test]
    fn matches_single_candidate_case_insensitively() {
        let ticker = EventTicker {
            date: chrono::NaiveDate::from_ymd_opt(2024, 11, 5).unwrap(),
            away: "LAL".to_string(),
            home: "BOS".to_string(),
        };
        let candidates = vec![game("lal", "bos", (2024, 11, 5))];
        let found = match_game(&ticker, &candidates).unwrap();
        assert_eq!(found.nba_game_id, "lalbos");
    }

    #[test]
    fn reports_not_found() {
        let ticker = EventTicker {
            date: chrono::NaiveDate::from_ymd_opt(2024, 11, 5).unwrap(),
            away: "LAL".to_string(),
            home: "BOS".to_string(),
        };
        let candidates = vec![game("GSW", "BOS", (2024, 11, 5))];
        assert!(matches!(match_game(&ticker, &candidates), Err(MatchError::NotFound { .. })));
    }

    #[test]
    fn reports_ambiguous_duplicates() {
        let ticker = EventTicker {
            date: chrono::NaiveDate::from_ymd_opt(2024, 11, 5).unwrap(),
            away: "LAL".to_string(),
            home: "BOS".to_string(),
        };
        let candidates = vec![game("LAL", "BOS", (2024, 11, 5)), game("LAL", "BOS", (2024, 11, 5))];
        assert!(matches!(match_game(&ticker, &candidates), Err(MatchError::Ambiguous { count: 2, .. })));
    }
}
