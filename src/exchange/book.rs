//! Full L2 orderbook reconciliation (spec §4.1).
//!
//! Each market's book is rebuilt from a snapshot and then kept current by
//! applying deltas in sequence order. A gap in `seq` invalidates the book
//! until the next snapshot arrives; reads during that window return the
//! last known top-of-book flagged `stale` rather than erroring.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::model::{OrderbookState, Side};

use super::wire::{OrderbookDelta, OrderbookSnapshot, PriceLevel};

#[derive(Debug, Clone, Default)]
pub struct MarketBook {
    yes_levels: BTreeMap<i32, i64>,
    no_levels: BTreeMap<i32, i64>,
    seq: i64,
    stale: bool,
    has_snapshot: bool,
}

impl MarketBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_snapshot(&mut self, snap: &OrderbookSnapshot) {
        self.yes_levels = price_levels_to_map(&snap.yes);
        self.no_levels = price_levels_to_map(&snap.no);
        self.seq = snap.seq;
        self.stale = false;
        self.has_snapshot = true;
    }

    /// Returns `Ok(())` on a clean in-order apply, `Err(())` on a detected
    /// sequence gap or a crossed book (the book is marked stale and the
    /// caller should request a fresh snapshot either way).
    pub fn apply_delta(&mut self, delta: &OrderbookDelta) -> Result<(), SequenceGap> {
        if !self.has_snapshot {
            self.stale = true;
            return Err(SequenceGap { expected: -1, received: delta.seq });
        }
        let expected = self.seq + 1;
        if delta.seq != expected {
            self.stale = true;
            return Err(SequenceGap { expected, received: delta.seq });
        }
        let levels = match delta.side {
            Side::Yes => &mut self.yes_levels,
            Side::No => &mut self.no_levels,
        };
        if delta.size == 0 {
            levels.remove(&delta.price);
        } else {
            levels.insert(delta.price, delta.size);
        }
        self.seq = delta.seq;

        // A delta that crosses yes_ask below yes_bid is a protocol failure,
        // not a valid market state (spec §8 boundary behavior) — resync
        // rather than serve it as live top-of-book.
        if !self.top_of_book().is_consistent() {
            self.stale = true;
            return Err(SequenceGap { expected: delta.seq, received: delta.seq });
        }
        Ok(())
    }

    /// Top-of-book view derived from the current level map: highest yes
    /// bid... except the exchange's "yes" map here holds asks (price
    /// levels someone is offering to sell Yes at), and "no" holds the
    /// mirrored side, so the Yes bid is the highest level on the No side
    /// re-expressed as `100 - price`, and the Yes ask is the lowest level
    /// on the Yes side directly. This mirrors how a binary market's two
    /// order books price off each other (spec §4.1).
    pub fn top_of_book(&self) -> OrderbookState {
        let yes_ask = self.yes_levels.keys().next().copied();
        let yes_ask_size = yes_ask.and_then(|p| self.yes_levels.get(&p).copied());
        let no_ask = self.no_levels.keys().next().copied();
        let no_ask_size = no_ask.and_then(|p| self.no_levels.get(&p).copied());
        let yes_bid = no_ask.map(|p| 100 - p);

        OrderbookState {
            yes_bid,
            yes_ask,
            no_bid: yes_ask.map(|p| 100 - p),
            no_ask,
            yes_bid_size: no_ask_size,
            yes_ask_size,
            no_bid_size: yes_ask_size,
            no_ask_size,
            last_update: Utc::now(),
            stale: self.stale,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGap {
    pub expected: i64,
    pub received: i64,
}

fn price_levels_to_map(levels: &[PriceLevel]) -> BTreeMap<i32, i64> {
    levels.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(seq: i64, yes: &[(i32, i64)], no: &[(i32, i64)]) -> OrderbookSnapshot {
        OrderbookSnapshot {
            market_ticker: "T".to_string(),
            seq,
            yes: yes.to_vec(),
            no: no.to_vec(),
        }
    }

    #[test]
    fn snapshot_then_top_of_book() {
        let mut book = MarketBook::new();
        book.apply_snapshot(&snap(1, &[(55, 10)], &[(47, 20)]));
        let tob = book.top_of_book();
        assert_eq!(tob.yes_ask, Some(55));
        assert_eq!(tob.no_ask, Some(47));
        assert_eq!(tob.yes_bid, Some(53));
        assert!(!tob.stale);
    }

    #[test]
    fn in_order_delta_applies_cleanly() {
        let mut book = MarketBook::new();
        book.apply_snapshot(&snap(1, &[(55, 10)], &[(47, 20)]));
        let delta = OrderbookDelta {
            market_ticker: "T".to_string(),
            seq: 2,
            side: Side::Yes,
            price: 54,
            size: 5,
        };
        assert!(book.apply_delta(&delta).is_ok());
        assert_eq!(book.top_of_book().yes_ask, Some(54));
    }

    #[test]
    fn sequence_gap_marks_stale() {
        let mut book = MarketBook::new();
        book.apply_snapshot(&snap(1, &[(55, 10)], &[(47, 20)]));
        let delta = OrderbookDelta {
            market_ticker: "T".to_string(),
            seq: 5,
            side: Side::Yes,
            price: 54,
            size: 5,
        };
        let err = book.apply_delta(&delta).unwrap_err();
        assert_eq!(err, SequenceGap { expected: 2, received: 5 });
        assert!(book.is_stale());
        assert!(book.top_of_book().stale);
    }

    #[test]
    fn crossed_book_marks_stale_and_resyncs() {
        let mut book = MarketBook::new();
        book.apply_snapshot(&snap(1, &[(55, 10)], &[(47, 20)]));
        // Yes bid derives from the no-side ask (100 - price); a deeper no
        // level pushes the derived yes_bid (70) above yes_ask (55).
        let delta = OrderbookDelta {
            market_ticker: "T".to_string(),
            seq: 2,
            side: Side::No,
            price: 30,
            size: 15,
        };
        let err = book.apply_delta(&delta).unwrap_err();
        assert_eq!(err, SequenceGap { expected: 2, received: 2 });
        assert!(book.is_stale());
        assert!(book.top_of_book().stale);
    }

    #[test]
    fn zero_size_removes_level() {
        let mut book = MarketBook::new();
        book.apply_snapshot(&snap(1, &[(55, 10), (56, 3)], &[]));
        let delta = OrderbookDelta {
            market_ticker: "T".to_string(),
            seq: 2,
            side: Side::Yes,
            price: 55,
            size: 0,
        };
        book.apply_delta(&delta).unwrap();
        assert_eq!(book.top_of_book().yes_ask, Some(56));
    }
}
