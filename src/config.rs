//! Process-wide configuration (spec §6 "Configuration inputs" + risk policy
//! defaults). Loaded once at startup via `clap`'s `env` feature layered over
//! `dotenv`-populated environment, validated before any subsystem starts —
//! no partial startup on a bad config.

use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "hoopbook", about = "NBA paper-trading exchange pipeline")]
pub struct AppConfig {
    /// Exchange REST base URL.
    #[arg(long, env = "EXCHANGE_REST_URL")]
    pub exchange_rest_url: String,

    /// Exchange streaming (WebSocket) URL.
    #[arg(long, env = "EXCHANGE_STREAM_URL")]
    pub exchange_stream_url: String,

    /// Exchange API key used by the pluggable request signer.
    #[arg(long, env = "EXCHANGE_API_KEY")]
    pub exchange_api_key: String,

    /// Exchange private key / secret used by the pluggable request signer.
    #[arg(long, env = "EXCHANGE_API_SECRET")]
    pub exchange_api_secret: String,

    /// Sports-data provider base URL.
    #[arg(long, env = "SPORTS_DATA_BASE_URL")]
    pub sports_data_base_url: String,

    /// Sports-data provider bearer-style API key.
    #[arg(long, env = "SPORTS_DATA_API_KEY")]
    pub sports_data_api_key: String,

    /// Storage connection URL (a sqlite file path for the bundled adapter).
    #[arg(long, env = "STORAGE_URL", default_value = "hoopbook.sqlite3")]
    pub storage_url: String,

    /// Log level / filter directive (`tracing_subscriber::EnvFilter` syntax).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Strategy evaluation cadence, seconds (spec §4.5 default 2s).
    #[arg(long, env = "EVALUATION_INTERVAL_SECS", default_value_t = 2)]
    pub evaluation_interval_secs: u64,

    /// NBA live-score poll interval, seconds (spec §4.4 default 5s).
    #[arg(long, env = "NBA_POLL_INTERVAL_SECS", default_value_t = 5)]
    pub nba_poll_interval_secs: u64,

    /// Sportsbook odds poll interval, seconds (spec §4.4 default 10s).
    #[arg(long, env = "ODDS_POLL_INTERVAL_SECS", default_value_t = 10)]
    pub odds_poll_interval_secs: u64,

    /// Paper-trading notional bankroll for Kelly sizing (spec §9 open question).
    #[arg(long, env = "BANKROLL_UNITS", default_value = "10000")]
    pub bankroll_units: Decimal,

    #[command(flatten)]
    pub risk: RiskPolicyConfig,
}

impl AppConfig {
    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_interval_secs)
    }

    pub fn nba_poll_interval(&self) -> Duration {
        Duration::from_secs(self.nba_poll_interval_secs)
    }

    pub fn odds_poll_interval(&self) -> Duration {
        Duration::from_secs(self.odds_poll_interval_secs)
    }

    /// Load from CLI args + environment (`.env` first, matching the teacher's
    /// `dotenv::dotenv()` call at the top of `main`).
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        AppConfig::parse()
    }
}

/// Risk policy defaults, spec §6 "Risk policy defaults" — all cents unless noted.
#[derive(Debug, Clone, Parser)]
pub struct RiskPolicyConfig {
    #[arg(long, env = "RISK_MAX_CONTRACTS_PER_MARKET", default_value_t = 100)]
    pub max_contracts_per_market: i64,

    #[arg(long, env = "RISK_MAX_CONTRACTS_PER_GAME", default_value_t = 200)]
    pub max_contracts_per_game: i64,

    #[arg(long, env = "RISK_MAX_TOTAL_CONTRACTS", default_value_t = 500)]
    pub max_total_contracts: i64,

    #[arg(long, env = "RISK_MAX_DAILY_LOSS_CENTS", default_value = "1000")]
    pub max_daily_loss: Decimal,

    #[arg(long, env = "RISK_MAX_WEEKLY_LOSS_CENTS", default_value = "5000")]
    pub max_weekly_loss: Decimal,

    #[arg(long, env = "RISK_MAX_PER_TRADE_RISK_CENTS", default_value = "500")]
    pub max_per_trade_risk: Decimal,

    #[arg(long, env = "RISK_MAX_TOTAL_EXPOSURE_CENTS", default_value = "10000")]
    pub max_total_exposure: Decimal,

    #[arg(long, env = "RISK_MAX_EXPOSURE_PER_GAME_CENTS", default_value = "2000")]
    pub max_exposure_per_game: Decimal,

    #[arg(
        long,
        env = "RISK_MAX_EXPOSURE_PER_STRATEGY_CENTS",
        default_value = "3000"
    )]
    pub max_exposure_per_strategy: Decimal,

    #[arg(long, env = "RISK_MAX_ORDERS_PER_DAY", default_value_t = 50)]
    pub max_orders_per_day: u32,

    #[arg(long, env = "RISK_MAX_ORDERS_PER_HOUR", default_value_t = 20)]
    pub max_orders_per_hour: u32,

    #[arg(long, env = "RISK_LOSS_STREAK_COOLDOWN", default_value_t = 3)]
    pub loss_streak_cooldown: u32,

    /// Minutes paused once `loss_streak_cooldown` consecutive losses hit.
    #[arg(long, env = "RISK_COOLDOWN_MINUTES", default_value_t = 5)]
    pub cooldown_minutes: i64,

    /// Worst-case loss per contract, cents. Fixed by the binary payout structure.
    #[arg(skip = dec!(100))]
    pub worst_case_loss_cents: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_policy_defaults_match_spec_section_6() {
        let cfg = RiskPolicyConfig::parse_from(["test"]);
        assert_eq!(cfg.max_contracts_per_market, 100);
        assert_eq!(cfg.max_contracts_per_game, 200);
        assert_eq!(cfg.max_total_contracts, 500);
        assert_eq!(cfg.max_daily_loss, dec!(1000));
        assert_eq!(cfg.max_weekly_loss, dec!(5000));
        assert_eq!(cfg.max_per_trade_risk, dec!(500));
        assert_eq!(cfg.max_total_exposure, dec!(10000));
        assert_eq!(cfg.max_exposure_per_game, dec!(2000));
        assert_eq!(cfg.max_exposure_per_strategy, dec!(3000));
        assert_eq!(cfg.max_orders_per_day, 50);
        assert_eq!(cfg.max_orders_per_hour, 20);
        assert_eq!(cfg.loss_streak_cooldown, 3);
    }
}
