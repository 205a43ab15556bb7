//! Storage (spec §6): the persisted schema backing every component.
//! `rusqlite` stands in for "any relational store satisfying the schema" —
//! the teacher's own signal store uses the same `Arc<Mutex<Connection>>` +
//! WAL pragma + `prepare_cached` shape, which this mirrors.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;

use crate::model::{
    Game, NbaLiveState, OddsQuote, OrderKind, OrderStatus, Phase, Position, SimulatedOrder, Side, StrategyKind,
};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS games (
    id TEXT PRIMARY KEY,
    event_ticker TEXT NOT NULL UNIQUE,
    nba_game_id TEXT UNIQUE,
    home_team TEXT NOT NULL,
    away_team TEXT NOT NULL,
    game_date TEXT NOT NULL,
    status TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kalshi_markets (
    id TEXT PRIMARY KEY,
    game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    ticker TEXT NOT NULL UNIQUE,
    market_type TEXT NOT NULL,
    strike_value TEXT,
    side TEXT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS orderbook_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    market_id TEXT NOT NULL REFERENCES kalshi_markets(id) ON DELETE CASCADE,
    timestamp TEXT NOT NULL,
    yes_bid TEXT, yes_ask TEXT, no_bid TEXT, no_ask TEXT,
    yes_bid_size INTEGER, yes_ask_size INTEGER, no_bid_size INTEGER, no_ask_size INTEGER,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_orderbook_snapshots_market_ts
    ON orderbook_snapshots(market_id, timestamp DESC);

CREATE TABLE IF NOT EXISTS nba_live_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    timestamp TEXT NOT NULL,
    period INTEGER NOT NULL,
    time_remaining TEXT NOT NULL,
    home_score INTEGER NOT NULL,
    away_score INTEGER NOT NULL,
    game_status TEXT NOT NULL,
    raw_data TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_nba_live_data_game_ts ON nba_live_data(game_id, timestamp DESC);

CREATE TABLE IF NOT EXISTS betting_odds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    nba_game_id TEXT,
    timestamp TEXT NOT NULL,
    vendor TEXT NOT NULL,
    moneyline_home INTEGER,
    moneyline_away INTEGER,
    spread_value TEXT,
    spread_home_odds INTEGER,
    total_value TEXT,
    total_over_odds INTEGER,
    total_under_odds INTEGER,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_betting_odds_game_ts ON betting_odds(game_id, timestamp DESC);

CREATE TABLE IF NOT EXISTS strategies (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    is_enabled INTEGER NOT NULL,
    config TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS simulated_orders (
    id TEXT PRIMARY KEY,
    game_id TEXT,
    strategy_id TEXT NOT NULL,
    market_ticker TEXT NOT NULL,
    order_type TEXT NOT NULL,
    side TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    limit_price INTEGER,
    filled_price TEXT,
    status TEXT NOT NULL,
    placed_at TEXT NOT NULL,
    filled_at TEXT,
    signal_data TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_simulated_orders_strategy_placed
    ON simulated_orders(strategy_id, placed_at DESC);

CREATE TABLE IF NOT EXISTS positions (
    id TEXT PRIMARY KEY,
    game_id TEXT,
    strategy_id TEXT NOT NULL,
    market_ticker TEXT NOT NULL,
    side TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    avg_price TEXT NOT NULL,
    current_price TEXT,
    unrealized_pnl TEXT,
    realized_pnl TEXT NOT NULL,
    is_open INTEGER NOT NULL,
    opened_at TEXT NOT NULL,
    closed_at TEXT,
    updated_at TEXT NOT NULL,
    UNIQUE(strategy_id, market_ticker, side)
);
CREATE INDEX IF NOT EXISTS idx_positions_strategy_open ON positions(strategy_id, is_open);

CREATE TABLE IF NOT EXISTS strategy_performance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_id TEXT NOT NULL,
    as_of TEXT NOT NULL,
    total_signals INTEGER NOT NULL,
    total_orders INTEGER NOT NULL,
    realized_pnl TEXT NOT NULL,
    win_count INTEGER NOT NULL,
    loss_count INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_strategy_performance_strategy_asof
    ON strategy_performance(strategy_id, as_of DESC);

CREATE TABLE IF NOT EXISTS risk_limits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    as_of TEXT NOT NULL,
    max_contracts_per_market INTEGER NOT NULL,
    max_contracts_per_game INTEGER NOT NULL,
    max_total_contracts INTEGER NOT NULL,
    max_daily_loss TEXT NOT NULL,
    max_weekly_loss TEXT NOT NULL,
    enabled INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS system_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    level TEXT NOT NULL,
    component TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_system_logs_created_at ON system_logs(created_at DESC);

CREATE TRIGGER IF NOT EXISTS games_updated_at AFTER UPDATE ON games BEGIN
    UPDATE games SET updated_at = datetime('now') WHERE id = new.id;
END;

CREATE TRIGGER IF NOT EXISTS strategies_updated_at AFTER UPDATE ON strategies BEGIN
    UPDATE strategies SET updated_at = datetime('now') WHERE id = new.id;
END;

CREATE TRIGGER IF NOT EXISTS positions_updated_at AFTER UPDATE ON positions BEGIN
    UPDATE positions SET updated_at = datetime('now') WHERE id = new.id;
END;
"#;

/// Owns the single sqlite connection. Cheap to clone (shares the
/// connection behind a lock), matching the teacher's `DbSignalStorage`.
#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    pub fn open(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn =
            Connection::open_with_flags(db_path, flags).with_context(|| format!("opening database at {db_path}"))?;
        conn.execute_batch(SCHEMA_SQL).context("initializing schema")?;
        info!(db_path, "storage initialized");
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory database")?;
        conn.execute_batch(SCHEMA_SQL).context("initializing schema")?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn upsert_game(&self, game: &Game) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO games (id, event_ticker, nba_game_id, home_team, away_team, game_date, status, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(event_ticker) DO UPDATE SET
                nba_game_id = excluded.nba_game_id,
                status = excluded.status,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at",
            params![
                game.id.to_string(),
                game.event_ticker,
                game.nba_game_id,
                game.home_team,
                game.away_team,
                game.scheduled_start.to_rfc3339(),
                phase_str(game.phase),
                game.is_active() as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_orderbook_snapshot(&self, market_ticker: &str, ob: &crate::model::OrderbookState) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO orderbook_snapshots
                (market_id, timestamp, yes_bid, yes_ask, no_bid, no_ask, yes_bid_size, yes_ask_size, no_bid_size, no_ask_size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                market_ticker,
                ob.last_update.to_rfc3339(),
                ob.yes_bid,
                ob.yes_ask,
                ob.no_bid,
                ob.no_ask,
                ob.yes_bid_size,
                ob.yes_ask_size,
                ob.no_bid_size,
                ob.no_ask_size,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_nba_live_data(&self, game_id: &str, state: &NbaLiveState) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO nba_live_data (game_id, timestamp, period, time_remaining, home_score, away_score, game_status, raw_data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)",
            params![
                game_id,
                state.last_update.to_rfc3339(),
                state.period,
                state.time_remaining,
                state.home_score,
                state.away_score,
                state.status,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_betting_odds(&self, game_id: &str, quote: &OddsQuote) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO betting_odds
                (game_id, nba_game_id, timestamp, vendor, moneyline_home, moneyline_away, spread_value, spread_home_odds, total_value, total_over_odds, total_under_odds, created_at)
             VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                game_id,
                quote.last_update.to_rfc3339(),
                quote.vendor.0,
                quote.moneyline_home,
                quote.moneyline_away,
                quote.spread_value.map(|d| d.to_string()),
                quote.spread_home_odds,
                quote.total_value.map(|d| d.to_string()),
                quote.over_odds,
                quote.under_odds,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn upsert_strategy(&self, id: &str, name: &str, kind: StrategyKind, enabled: bool, config: &Value) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO strategies (id, name, type, is_enabled, config, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(id) DO UPDATE SET
                is_enabled = excluded.is_enabled,
                config = excluded.config,
                updated_at = excluded.updated_at",
            params![id, name, kind.as_str(), enabled as i64, config.to_string(), now],
        )?;
        Ok(())
    }

    pub fn insert_order(&self, order: &SimulatedOrder, game_id: Option<&str>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO simulated_orders
                (id, game_id, strategy_id, market_ticker, order_type, side, quantity, limit_price, filled_price, status, placed_at, filled_at, signal_data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                order.id.to_string(),
                game_id,
                order.strategy_id.to_string(),
                order.market_ticker,
                order_kind_str(order.kind),
                side_str(order.side),
                order.quantity,
                order.limit_price,
                order.fill_price.map(|p| p.to_string()),
                order_status_str(order.status),
                order.placed_at.to_rfc3339(),
                order.filled_at.map(|t| t.to_rfc3339()),
                order.signal_snapshot.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn upsert_position(&self, position: &Position) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO positions
                (id, game_id, strategy_id, market_ticker, side, quantity, avg_price, current_price, unrealized_pnl, realized_pnl, is_open, opened_at, closed_at, updated_at)
             VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(strategy_id, market_ticker, side) DO UPDATE SET
                quantity = excluded.quantity,
                avg_price = excluded.avg_price,
                current_price = excluded.current_price,
                unrealized_pnl = excluded.unrealized_pnl,
                realized_pnl = excluded.realized_pnl,
                is_open = excluded.is_open,
                closed_at = excluded.closed_at,
                updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                position.strategy_id.to_string(),
                position.market_ticker,
                side_str(position.side),
                position.quantity,
                position.avg_price.to_string(),
                position.current_price.map(|p| p.to_string()),
                position.unrealized_pnl.to_string(),
                position.realized_pnl.to_string(),
                position.is_open as i64,
                position.opened_at.to_rfc3339(),
                position.closed_at.map(|t| t.to_rfc3339()),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_open_positions(&self) -> Result<Vec<Position>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT strategy_id, market_ticker, side, quantity, avg_price, current_price, unrealized_pnl, realized_pnl, is_open, opened_at, closed_at
             FROM positions WHERE is_open = 1",
        )?;
        let rows = stmt.query_map([], row_to_position)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Replays the order log into a fresh position book (spec §4.7 "a crash
    /// between [writes] is recoverable because positions can be
    /// reconstructed from orders by replay").
    pub fn rebuild_positions_from_orders(&self) -> Result<Vec<SimulatedOrder>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, strategy_id, market_ticker, side, quantity, order_type, limit_price, filled_price, status, placed_at, filled_at, signal_data
             FROM simulated_orders WHERE status = 'filled' ORDER BY placed_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_order)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn record_risk_limits_snapshot(
        &self,
        as_of: DateTime<Utc>,
        max_contracts_per_market: i64,
        max_contracts_per_game: i64,
        max_total_contracts: i64,
        max_daily_loss: Decimal,
        max_weekly_loss: Decimal,
        enabled: bool,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO risk_limits (as_of, max_contracts_per_market, max_contracts_per_game, max_total_contracts, max_daily_loss, max_weekly_loss, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                as_of.to_rfc3339(),
                max_contracts_per_market,
                max_contracts_per_game,
                max_total_contracts,
                max_daily_loss.to_string(),
                max_weekly_loss.to_string(),
                enabled as i64,
            ],
        )?;
        Ok(())
    }

    pub fn log_system_event(&self, level: &str, component: &str, message: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO system_logs (level, component, message, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![level, component, message, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

fn phase_str(phase: Phase) -> &'static str {
    match phase {
        Phase::Scheduled => "scheduled",
        Phase::Live => "live",
        Phase::Finished => "finished",
    }
}

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Yes => "yes",
        Side::No => "no",
    }
}

fn order_kind_str(kind: OrderKind) -> &'static str {
    match kind {
        OrderKind::Market => "market",
        OrderKind::Limit => "limit",
    }
}

fn order_status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Filled => "filled",
        OrderStatus::Rejected => "rejected",
        OrderStatus::Cancelled => "cancelled",
    }
}

fn row_to_position(row: &rusqlite::Row) -> rusqlite::Result<Position> {
    use std::str::FromStr;
    let strategy_id: String = row.get(0)?;
    let avg_price: String = row.get(4)?;
    let current_price: Option<String> = row.get(5)?;
    let unrealized_pnl: Option<String> = row.get(6)?;
    let realized_pnl: String = row.get(7)?;
    let opened_at: String = row.get(9)?;
    let closed_at: Option<String> = row.get(10)?;
    let side: String = row.get(2)?;

    Ok(Position {
        strategy_id: crate::model::StrategyId(uuid::Uuid::parse_str(&strategy_id).unwrap_or_default()),
        market_ticker: row.get(1)?,
        side: if side == "yes" { Side::Yes } else { Side::No },
        quantity: row.get(3)?,
        avg_price: Decimal::from_str(&avg_price).unwrap_or_default(),
        current_price: current_price.and_then(|s| Decimal::from_str(&s).ok()),
        unrealized_pnl: unrealized_pnl.and_then(|s| Decimal::from_str(&s).ok()).unwrap_or_default(),
        realized_pnl: Decimal::from_str(&realized_pnl).unwrap_or_default(),
        is_open: row.get::<_, i64>(8)? != 0,
        opened_at: DateTime::parse_from_rfc3339(&opened_at).map(|t| t.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
        closed_at: closed_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|t| t.with_timezone(&Utc)),
    })
}

fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<SimulatedOrder> {
    use std::str::FromStr;
    let id: String = row.get(0)?;
    let strategy_id: String = row.get(1)?;
    let side: String = row.get(3)?;
    let order_type: String = row.get(5)?;
    let filled_price: Option<String> = row.get(7)?;
    let status: String = row.get(8)?;
    let placed_at: String = row.get(9)?;
    let filled_at: Option<String> = row.get(10)?;
    let signal_data: String = row.get(11)?;

    Ok(SimulatedOrder {
        id: crate::model::OrderId(uuid::Uuid::parse_str(&id).unwrap_or_default()),
        strategy_id: crate::model::StrategyId(uuid::Uuid::parse_str(&strategy_id).unwrap_or_default()),
        market_ticker: row.get(2)?,
        side: if side == "yes" { Side::Yes } else { Side::No },
        quantity: row.get(4)?,
        kind: if order_type == "market" { OrderKind::Market } else { OrderKind::Limit },
        limit_price: row.get(6)?,
        fill_price: filled_price.and_then(|s| Decimal::from_str(&s).ok()),
        status: match status.as_str() {
            "filled" => OrderStatus::Filled,
            "rejected" => OrderStatus::Rejected,
            "cancelled" => OrderStatus::Cancelled,
            _ => OrderStatus::Pending,
        },
        placed_at: DateTime::parse_from_rfc3339(&placed_at).map(|t| t.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
        filled_at: filled_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|t| t.with_timezone(&Utc)),
        reject_reason: None,
        signal_snapshot: serde_json::from_str(&signal_data).unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Game, GameId, OrderId, StrategyId};

    fn sample_game() -> Game {
        Game {
            id: GameId::new(),
            event_ticker: "KXNBAGAME-24NOV05LALBOS".to_string(),
            nba_game_id: Some("nba-1".to_string()),
            home_team: "BOS".to_string(),
            away_team: "LAL".to_string(),
            scheduled_start: Utc::now(),
            phase: Phase::Live,
        }
    }

    #[test]
    fn upsert_game_is_idempotent() {
        let storage = Storage::open_in_memory().unwrap();
        let game = sample_game();
        storage.upsert_game(&game).unwrap();
        storage.upsert_game(&game).unwrap();
    }

    #[test]
    fn order_round_trips_through_replay() {
        let storage = Storage::open_in_memory().unwrap();
        let order = SimulatedOrder {
            id: OrderId::new(),
            strategy_id: StrategyId::new(),
            market_ticker: "KXNBAGAME-24NOV05LALBOS-Y".to_string(),
            side: Side::Yes,
            quantity: 10,
            kind: OrderKind::Market,
            limit_price: None,
            fill_price: Some(Decimal::from(44)),
            status: OrderStatus::Filled,
            placed_at: Utc::now(),
            filled_at: Some(Utc::now()),
            reject_reason: None,
            signal_snapshot: serde_json::json!({"reason": "test"}),
        };
        storage.insert_order(&order, None).unwrap();
        let replayed = storage.rebuild_positions_from_orders().unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].quantity, 10);
    }

    #[test]
    fn position_round_trips() {
        let storage = Storage::open_in_memory().unwrap();
        let position = Position {
            strategy_id: StrategyId::new(),
            market_ticker: "KXNBAGAME-24NOV05LALBOS-Y".to_string(),
            side: Side::Yes,
            quantity: 10,
            avg_price: Decimal::from(44),
            current_price: None,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            is_open: true,
            opened_at: Utc::now(),
            closed_at: None,
        };
        storage.upsert_position(&position).unwrap();
        let open = storage.list_open_positions().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].quantity, 10);
    }
}
