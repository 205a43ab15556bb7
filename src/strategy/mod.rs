//! StrategyEngine (C5, spec §4.5): a registry of strategy kinds evaluated
//! on a fixed cadence against every loaded game's [`GameState`].

pub mod common;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod ev_multi_book;
pub mod mean_reversion;
pub mod momentum;
pub mod sharp_line;

pub use common::{build_signal, CooldownMap, EvalContext, SignalRing, Strategy, SIGNAL_RING_CAPACITY};
pub use config::{CorrelationConfig, EvMultiBookConfig, MeanReversionConfig, MomentumConfig, SharpLineConfig};
pub use correlation::CorrelationStrategy;
pub use engine::{SignalHandler, StrategyEngine};
pub use ev_multi_book::EvMultiBookStrategy;
pub use mean_reversion::MeanReversionStrategy;
pub use momentum::MomentumStrategy;
pub use sharp_line::SharpLineStrategy;
