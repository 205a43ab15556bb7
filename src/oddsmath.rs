//! OddsMath (C8) — shared pure decimal math: American↔probability
//! conversion, expected value, consensus aggregation, and Kelly sizing.
//!
//! No floating point anywhere in this module. All arithmetic happens in
//! `rust_decimal::Decimal`; inputs in cents are plain integers.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

/// Minimum price (in the [0,1] fraction-of-payout sense) used as an EV
/// denominator floor, so a 0¢ market can't divide by zero (spec §8
/// boundary behavior: "EV formula must not divide by zero").
const MIN_EV_DENOMINATOR: Decimal = dec!(0.01);

/// American odds must have a magnitude of at least 100; this is the
/// canonical boundary referenced by spec §8's round-trip law.
pub fn canonicalize_american(odds: i32) -> i32 {
    if odds == 100 {
        -100
    } else {
        odds
    }
}

/// Convert American odds to an implied probability on [0, 1].
///
/// Negative odds (favorite): p = -odds / (-odds + 100).
/// Positive odds (underdog): p = 100 / (odds + 100).
pub fn american_to_prob(odds: i32) -> Decimal {
    let odds = Decimal::from(odds);
    if odds < Decimal::ZERO {
        let mag = -odds;
        mag / (mag + dec!(100))
    } else {
        dec!(100) / (odds + dec!(100))
    }
}

/// Convert an implied probability back to canonical American odds.
/// At exactly p=0.5 the canonical representation is -100 (favorite side),
/// matching [`canonicalize_american`].
pub fn prob_to_american(p: Decimal) -> i32 {
    let p = p.clamp(dec!(0.0001), dec!(0.9999));
    if p >= dec!(0.5) {
        let odds = -(p / (Decimal::ONE - p)) * dec!(100);
        odds.round().to_i32().unwrap_or(-100)
    } else {
        let odds = ((Decimal::ONE - p) / p) * dec!(100);
        odds.round().to_i32().unwrap_or(100)
    }
}

/// Expected value, as a percent: ((true_probability − cost) / cost) × 100,
/// where `cost` is the entry price expressed as a fraction of the $1
/// payout (e.g. a 44¢ entry is `0.44`). Guards the denominator at
/// [`MIN_EV_DENOMINATOR`] so a 0¢/1¢ market never divides by zero.
pub fn ev_percent(true_probability: Decimal, cost: Decimal) -> Decimal {
    let cost = cost.max(MIN_EV_DENOMINATOR);
    ((true_probability - cost) / cost) * dec!(100)
}

/// Median consensus probability across vendors (spec §4.5.1). Returns
/// `None` on an empty slice; callers are responsible for the
/// `min_sample_sportsbooks` gate before calling this.
pub fn median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<Decimal> = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / dec!(2)
    })
}

/// Kelly criterion fraction for a binary market priced at `cost` (fraction
/// of $1 payout) with true win probability `win_probability`. `b` is the
/// net decimal odds offered: `(1 − cost) / cost`. Returns a fraction on
/// [0, 1]; never negative (per spec §4.5.1 "never negative").
pub fn kelly_fraction(win_probability: Decimal, cost: Decimal) -> Decimal {
    let cost = cost.clamp(MIN_EV_DENOMINATOR, dec!(0.99));
    let p = win_probability.clamp(dec!(0.0001), dec!(0.9999));
    let q = Decimal::ONE - p;
    let b = (Decimal::ONE - cost) / cost;
    if b <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((b * p - q) / b).max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favorite_round_trips() {
        for odds in [-10000, -500, -150, -110, -100] {
            let canonical = canonicalize_american(odds);
            let p = american_to_prob(canonical);
            assert_eq!(prob_to_american(p), canonical, "odds={odds}");
        }
    }

    #[test]
    fn underdog_round_trips() {
        for odds in [150, 200, 500, 10000] {
            let canonical = canonicalize_american(odds);
            let p = american_to_prob(canonical);
            assert_eq!(prob_to_american(p), canonical, "odds={odds}");
        }
    }

    #[test]
    fn boundary_plus_100_canonicalizes_to_minus_100() {
        assert_eq!(canonicalize_american(100), -100);
        assert_eq!(american_to_prob(100), american_to_prob(-100));
    }

    #[test]
    fn even_money_is_half() {
        assert_eq!(american_to_prob(-100), dec!(0.5));
    }

    #[test]
    fn sharpline_scenario_s1_median_and_ev() {
        // spec.md S1: vendors {-150, -140, -160} -> median ~0.60
        let probs: Vec<Decimal> = [-150, -140, -160].iter().map(|o| american_to_prob(*o)).collect();
        let cons = median(&probs).unwrap();
        assert!((cons - dec!(0.60)).abs() < dec!(0.001));

        // entry = 44c, ev_percent = ((0.60 - 0.44)/0.44)*100 ~= 36.36%
        let ev = ev_percent(cons, dec!(0.44));
        assert!((ev - dec!(36.36)).abs() < dec!(0.1));
    }

    #[test]
    fn ev_guards_zero_price() {
        let ev = ev_percent(dec!(0.5), Decimal::ZERO);
        // denominator floors at 0.01 instead of panicking/inf
        assert_eq!(ev, ((dec!(0.5) - dec!(0.01)) / dec!(0.01)) * dec!(100));
    }

    #[test]
    fn median_even_count_averages_middle_two() {
        let v = vec![dec!(0.1), dec!(0.2), dec!(0.3), dec!(0.4)];
        assert_eq!(median(&v), Some(dec!(0.25)));
    }

    #[test]
    fn kelly_never_negative() {
        let f = kelly_fraction(dec!(0.1), dec!(0.8));
        assert!(f >= Decimal::ZERO);
    }
}
