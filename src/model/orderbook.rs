use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consolidated top-of-book view of a market (spec §3 "OrderbookState").
/// Any side may be absent (no resting liquidity on that side yet).
///
/// Invariant: when both `yes_ask` and `no_bid` are present,
/// `yes_ask + no_bid` is within a few cents of 100 (the two sides of a
/// binary market price off each other); `yes_bid <= yes_ask` when both
/// are present. [`OrderbookState::is_consistent`] checks this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderbookState {
    pub yes_bid: Option<i32>,
    pub yes_ask: Option<i32>,
    pub no_bid: Option<i32>,
    pub no_ask: Option<i32>,
    pub yes_bid_size: Option<i64>,
    pub yes_ask_size: Option<i64>,
    pub no_bid_size: Option<i64>,
    pub no_ask_size: Option<i64>,
    pub last_update: DateTime<Utc>,
    /// Set by the exchange stream while a resync is pending (spec §4.1:
    /// on a sequence gap, the ticker's state is invalidated until the
    /// next snapshot). Reads still return the last known state flagged
    /// stale rather than panicking.
    pub stale: bool,
}

impl OrderbookState {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            yes_bid: None,
            yes_ask: None,
            no_bid: None,
            no_ask: None,
            yes_bid_size: None,
            yes_ask_size: None,
            no_bid_size: None,
            no_ask_size: None,
            last_update: now,
            stale: false,
        }
    }

    /// Within rounding tolerance of the binary-market pricing invariant.
    /// A 0¢/100¢ market is permitted at the extremes (spec §8 boundary
    /// behavior), so the tolerance is generous (a few cents) rather than
    /// an exact-sum check.
    pub fn is_consistent(&self) -> bool {
        if let (Some(bid), Some(ask)) = (self.yes_bid, self.yes_ask) {
            if bid > ask {
                return false;
            }
        }
        if let (Some(ask), Some(bid)) = (self.yes_ask, self.no_bid) {
            let sum = ask + bid;
            if !(95..=105).contains(&sum) {
                return false;
            }
        }
        true
    }

    /// Mid price in cents for the Yes side: average of both sides when
    /// present, else whichever side is present, else `None` (spec §4.3).
    pub fn yes_mid_cents(&self) -> Option<rust_decimal::Decimal> {
        use rust_decimal::Decimal;
        match (self.yes_bid, self.yes_ask) {
            (Some(b), Some(a)) => Some((Decimal::from(b) + Decimal::from(a)) / Decimal::from(2)),
            (Some(b), None) => Some(Decimal::from(b)),
            (None, Some(a)) => Some(Decimal::from(a)),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_sided_book_mid_is_that_side() {
        let mut ob = OrderbookState::empty(Utc::now());
        ob.yes_bid = Some(40);
        assert_eq!(ob.yes_mid_cents(), Some(rust_decimal::Decimal::from(40)));
    }

    #[test]
    fn both_sides_mid_is_average() {
        let mut ob = OrderbookState::empty(Utc::now());
        ob.yes_bid = Some(42);
        ob.yes_ask = Some(44);
        assert_eq!(ob.yes_mid_cents(), Some(rust_decimal::Decimal::from(43)));
    }

    #[test]
    fn inverted_book_is_inconsistent() {
        let mut ob = OrderbookState::empty(Utc::now());
        ob.yes_bid = Some(50);
        ob.yes_ask = Some(49);
        assert!(!ob.is_consistent());
    }
}
