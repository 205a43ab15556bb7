use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::GameId;

/// Lifecycle phase of a tracked game (spec §3 "Game").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Scheduled,
    Live,
    Finished,
}

/// A tracked NBA game. Identity is the opaque [`GameId`] plus the
/// exchange's event ticker, which is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub event_ticker: String,
    pub nba_game_id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub scheduled_start: DateTime<Utc>,
    pub phase: Phase,
}

impl Game {
    pub fn is_active(&self) -> bool {
        !matches!(self.phase, Phase::Finished)
    }
}
