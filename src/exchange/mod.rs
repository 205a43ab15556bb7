//! Exchange market-data stream (C1, spec §4.1).

pub mod book;
pub mod stream;
pub mod wire;

pub use book::MarketBook;
pub use stream::{ExchangeEvent, ExchangeStream};
