//! Sports-data feed (C2 SportsFeed, spec §4.2).

pub mod client;
pub mod matching;

pub use client::{ScheduledGame, SportsFeedClient};
pub use matching::{match_game, MatchError};
