//! Data model (spec §3) — the eleven-table relational schema's runtime
//! counterparts. Entities here are plain data; component modules
//! (`gamestate`, `risk`, `execution`, `strategy`) own mutation.

pub mod game;
pub mod ids;
pub mod market;
pub mod nba;
pub mod odds;
pub mod order;
pub mod orderbook;
pub mod position;
pub mod risk_account;
pub mod signal;

pub use game::{Game, Phase};
pub use ids::{GameId, OrderId, StrategyId};
pub use market::{Market, MarketKind, Side};
pub use nba::NbaLiveState;
pub use odds::{OddsQuote, Vendor};
pub use order::{OrderKind, OrderStatus, SimulatedOrder};
pub use orderbook::OrderbookState;
pub use position::Position;
pub use risk_account::RiskAccount;
pub use signal::{StrategyKind, TradeSignal};
