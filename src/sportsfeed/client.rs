//! Sports-data HTTP client (C2 SportsFeed, spec §4.2).
//!
//! Bounded retries with fixed backoff (1s/2s/4s), honoring a `Retry-After`
//! header when the provider sends one. Three consecutive failures bubble
//! up as [`crate::error::EngineError::DataUnavailable`] so the poller that
//! owns the retry loop's caller can decide whether to keep the stale
//! reading or surface the gap.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::model::{NbaLiveState, OddsQuote, Vendor};
use crate::signing::SportsFeedAuth;

const RETRY_BACKOFFS: [Duration; 3] =
    [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];

#[derive(Clone)]
pub struct SportsFeedClient {
    http: Client,
    base_url: String,
    auth: std::sync::Arc<dyn SportsFeedAuth>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledGame {
    pub nba_game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub scheduled_start: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct GamesResponse {
    games: Vec<ScheduledGame>,
}

#[derive(Debug, Deserialize)]
struct BoxScoreResponse {
    period: u32,
    time_remaining: String,
    home_score: i32,
    away_score: i32,
    status: String,
}

#[derive(Debug, Deserialize)]
struct OddsResponse {
    quotes: Vec<RawOddsQuote>,
}

#[derive(Debug, Deserialize)]
struct RawOddsQuote {
    vendor: String,
    moneyline_home: Option<i32>,
    moneyline_away: Option<i32>,
    spread_value: Option<Decimal>,
    spread_home_odds: Option<i32>,
    total_value: Option<Decimal>,
    over_odds: Option<i32>,
    under_odds: Option<i32>,
}

impl SportsFeedClient {
    pub fn new(base_url: String, auth: std::sync::Arc<dyn SportsFeedAuth>) -> EngineResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::TransportFailure(e.to_string()))?;
        Ok(Self { http, base_url, auth })
    }

    pub async fn games_for_date(&self, date: NaiveDate) -> EngineResult<Vec<ScheduledGame>> {
        let url = format!("{}/games", self.base_url);
        let body: GamesResponse = self
            .get_with_retry(&url, &[("date", &date.format("%Y-%m-%d").to_string())])
            .await?;
        Ok(body.games)
    }

    pub async fn live_box_score(&self, nba_game_id: &str) -> EngineResult<NbaLiveState> {
        let url = format!("{}/games/{}/boxscore", self.base_url, nba_game_id);
        let body: BoxScoreResponse = self.get_with_retry(&url, &[]).await?;
        Ok(NbaLiveState {
            period: body.period,
            time_remaining: body.time_remaining,
            home_score: body.home_score,
            away_score: body.away_score,
            status: body.status,
            last_update: chrono::Utc::now(),
        })
    }

    pub async fn odds(&self, nba_game_id: &str) -> EngineResult<Vec<OddsQuote>> {
        let url = format!("{}/games/{}/odds", self.base_url, nba_game_id);
        let body: OddsResponse = self.get_with_retry(&url, &[]).await?;
        let now = chrono::Utc::now();
        Ok(body
            .quotes
            .into_iter()
            .map(|q| OddsQuote {
                vendor: Vendor(q.vendor),
                moneyline_home: q.moneyline_home,
                moneyline_away: q.moneyline_away,
                spread_value: q.spread_value,
                spread_home_odds: q.spread_home_odds,
                total_value: q.total_value,
                over_odds: q.over_odds,
                under_odds: q.under_odds,
                last_update: now,
            })
            .collect())
    }

    async fn get_with_retry<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> EngineResult<T> {
        let mut attempt = 0;
        loop {
            let mut req = self.http.get(url).query(query);
            for (k, v) in self.auth.auth_headers() {
                req = req.header(k, v);
            }

            let result = req.send().await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<T>()
                        .await
                        .map_err(|e| EngineError::ProtocolFailure(e.to_string()));
                }
                Ok(resp) => {
                    let retry_after = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    let status = resp.status();
                    warn!(url, %status, attempt, "sports feed request failed");
                    if attempt >= RETRY_BACKOFFS.len() {
                        return Err(EngineError::DataUnavailable(format!(
                            "{url} returned {status} after {attempt} retries"
                        )));
                    }
                    tokio::time::sleep(retry_after.unwrap_or(RETRY_BACKOFFS[attempt])).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(url, error = %e, attempt, "sports feed request errored");
                    if attempt >= RETRY_BACKOFFS.len() {
                        return Err(EngineError::TransportFailure(e.to_string()));
                    }
                    tokio::time::sleep(RETRY_BACKOFFS[attempt]).await;
                    attempt += 1;
                }
            }
        }
    }
}
