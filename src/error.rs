//! Error taxonomy for the pipeline (spec §7).
//!
//! Adapter-level errors never escape a poller/stream worker — they are
//! logged and the worker keeps running. This enum exists so the places
//! that *do* need to inspect the failure kind (risk statistics, order
//! rows, system_logs) can match on it instead of stringly-typed causes.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Retried with backoff at the adapter; surfaced only after bounded attempts.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// Fatal for the affected adapter; the adapter stops retrying.
    #[error("auth failure: {0}")]
    AuthFailure(String),

    /// Malformed frame or sequence gap; localized recovery (discard + resync).
    #[error("protocol failure: {0}")]
    ProtocolFailure(String),

    /// No orderbook / missing odds; strategies skip, execution rejects.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Non-fatal; recorded on the order row and engine statistics.
    #[error("risk rejection: {limit_type} current={current} limit={limit} ({reason})")]
    RiskRejection {
        limit_type: String,
        current: String,
        limit: String,
        reason: String,
    },

    /// Negative quantity, avg_price out of range, duplicate fill, etc.
    /// Fatal for the offending operation: abort, log, leave state unchanged.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
