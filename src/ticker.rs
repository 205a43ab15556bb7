//! Exchange ticker grammar (spec GLOSSARY, §3).
//!
//! Event ticker: `KXNBAGAME-YYmmmDD{AWAY}{HOME}`, e.g.
//! `KXNBAGAME-24NOV05LALBOS` (Nov 5 2024, LAL at BOS). Market tickers
//! extend the event ticker with a suffix: `-Y` / `-N` for the moneyline,
//! `-SPREAD-{TEAM}{value}` and `-TOTAL-{O|U}{value}` for derivative
//! markets. Parsing is tolerant of casing since the exchange's REST and
//! WebSocket surfaces have been observed to disagree on it.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TickerError {
    #[error("ticker {0:?} does not start with the KXNBAGAME event prefix")]
    MissingPrefix(String),
    #[error("ticker {0:?} has a malformed date component")]
    BadDate(String),
    #[error("ticker {0:?} has a malformed team component")]
    BadTeams(String),
    #[error("ticker {0:?} has an unrecognized market suffix")]
    BadSuffix(String),
}

const EVENT_PREFIX: &str = "KXNBAGAME-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTicker {
    pub date: NaiveDate,
    pub away: String,
    pub home: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketSuffix {
    /// Home team moneyline: bare `-Y`/`-N` (spec §3 `kalshi_markets.market_type
    /// = moneyline_home`).
    MoneylineYes,
    MoneylineNo,
    /// Away team moneyline: `-AWAY-Y`/`-AWAY-N`. Not shown in the distilled
    /// ticker grammar, which only documents one moneyline suffix pair; added
    /// because the relational schema lists `moneyline_home` and
    /// `moneyline_away` as two independently-priced markets, which is what
    /// Correlation Check A (§4.5.5) arbitrages between. See DESIGN.md.
    AwayMoneylineYes,
    AwayMoneylineNo,
    Spread { team: [char; 3], value_tenths: i32 },
    TotalOver { value_tenths: i32 },
    TotalUnder { value_tenths: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketTicker {
    pub event: EventTicker,
    pub suffix: MarketSuffix,
}

impl MarketSuffix {
    pub fn is_moneyline(self) -> bool {
        matches!(
            self,
            MarketSuffix::MoneylineYes
                | MarketSuffix::MoneylineNo
                | MarketSuffix::AwayMoneylineYes
                | MarketSuffix::AwayMoneylineNo
        )
    }

    pub fn is_home_moneyline(self) -> bool {
        matches!(self, MarketSuffix::MoneylineYes | MarketSuffix::MoneylineNo)
    }

    pub fn is_away_moneyline(self) -> bool {
        matches!(self, MarketSuffix::AwayMoneylineYes | MarketSuffix::AwayMoneylineNo)
    }

    /// The `market_types` string a strategy config filters on (spec §4.5.2
    /// etc: `["moneyline", "spread", "total"]`).
    pub fn category(self) -> &'static str {
        match self {
            MarketSuffix::MoneylineYes
            | MarketSuffix::MoneylineNo
            | MarketSuffix::AwayMoneylineYes
            | MarketSuffix::AwayMoneylineNo => "moneyline",
            MarketSuffix::Spread { .. } => "spread",
            MarketSuffix::TotalOver { .. } | MarketSuffix::TotalUnder { .. } => "total",
        }
    }
}

/// Builds the four always-listed market tickers for a game's event ticker:
/// home moneyline Yes/No and away moneyline Yes/No (spec §3 `kalshi_markets`
/// carries both `moneyline_home` and `moneyline_away` rows per game).
pub fn standard_market_tickers(event_ticker: &str) -> Vec<String> {
    vec![
        format!("{event_ticker}-Y"),
        format!("{event_ticker}-N"),
        format!("{event_ticker}-AWAY-Y"),
        format!("{event_ticker}-AWAY-N"),
    ]
}

/// Parse an event ticker (no market suffix), e.g. `KXNBAGAME-24NOV05LALBOS`.
pub fn parse_event_ticker(raw: &str) -> Result<EventTicker, TickerError> {
    let upper = raw.to_ascii_uppercase();
    let rest = upper
        .strip_prefix(EVENT_PREFIX)
        .ok_or_else(|| TickerError::MissingPrefix(raw.to_string()))?;

    // rest = "24NOV05LALBOS": 2-digit year, 3-letter month, 2-digit day,
    // then two 3-letter team codes (away, home).
    if rest.len() != 13 {
        return Err(TickerError::BadDate(raw.to_string()));
    }
    let (date_part, teams_part) = rest.split_at(7);
    let date = parse_date_ddmmmyy(date_part).ok_or_else(|| TickerError::BadDate(raw.to_string()))?;

    if teams_part.len() != 6 || !teams_part.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(TickerError::BadTeams(raw.to_string()));
    }
    let away = teams_part[0..3].to_string();
    let home = teams_part[3..6].to_string();

    Ok(EventTicker { date, away, home })
}

/// Parse a full market ticker, including its trailing suffix.
pub fn parse_market_ticker(raw: &str) -> Result<MarketTicker, TickerError> {
    let upper = raw.to_ascii_uppercase();

    if let Some(event_part) = upper.strip_suffix("-AWAY-Y") {
        return Ok(MarketTicker {
            event: parse_event_ticker(event_part)?,
            suffix: MarketSuffix::AwayMoneylineYes,
        });
    }
    if let Some(event_part) = upper.strip_suffix("-AWAY-N") {
        return Ok(MarketTicker {
            event: parse_event_ticker(event_part)?,
            suffix: MarketSuffix::AwayMoneylineNo,
        });
    }
    if let Some(event_part) = upper.strip_suffix("-Y") {
        return Ok(MarketTicker {
            event: parse_event_ticker(event_part)?,
            suffix: MarketSuffix::MoneylineYes,
        });
    }
    if let Some(event_part) = upper.strip_suffix("-N") {
        return Ok(MarketTicker {
            event: parse_event_ticker(event_part)?,
            suffix: MarketSuffix::MoneylineNo,
        });
    }
    if let Some(rest) = upper.split_once("-SPREAD-").map(|(_, r)| r) {
        let event_part = upper.split("-SPREAD-").next().unwrap();
        let (team_str, value_str) = split_team_value(rest).ok_or_else(|| TickerError::BadSuffix(raw.to_string()))?;
        let team = team_chars(&team_str).ok_or_else(|| TickerError::BadSuffix(raw.to_string()))?;
        let value_tenths = parse_signed_tenths(&value_str).ok_or_else(|| TickerError::BadSuffix(raw.to_string()))?;
        return Ok(MarketTicker {
            event: parse_event_ticker(event_part)?,
            suffix: MarketSuffix::Spread { team, value_tenths },
        });
    }
    if let Some(rest) = upper.split_once("-TOTAL-").map(|(_, r)| r) {
        let event_part = upper.split("-TOTAL-").next().unwrap();
        let event = parse_event_ticker(event_part)?;
        if let Some(v) = rest.strip_prefix('O') {
            let value_tenths = parse_unsigned_tenths(v).ok_or_else(|| TickerError::BadSuffix(raw.to_string()))?;
            return Ok(MarketTicker { event, suffix: MarketSuffix::TotalOver { value_tenths } });
        }
        if let Some(v) = rest.strip_prefix('U') {
            let value_tenths = parse_unsigned_tenths(v).ok_or_else(|| TickerError::BadSuffix(raw.to_string()))?;
            return Ok(MarketTicker { event, suffix: MarketSuffix::TotalUnder { value_tenths } });
        }
        return Err(TickerError::BadSuffix(raw.to_string()));
    }

    Err(TickerError::BadSuffix(raw.to_string()))
}

fn split_team_value(s: &str) -> Option<(String, String)> {
    let idx = s.find(|c: char| c == '+' || c == '-' || c.is_ascii_digit())?;
    if idx < 3 {
        return None;
    }
    Some((s[..3].to_string(), s[3..].to_string()))
}

fn team_chars(s: &str) -> Option<[char; 3]> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() != 3 || !chars.iter().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some([chars[0], chars[1], chars[2]])
}

fn parse_signed_tenths(s: &str) -> Option<i32> {
    let (sign, digits) = match s.strip_prefix('-') {
        Some(d) => (-1, d),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    Some(sign * parse_unsigned_tenths(digits)?)
}

fn parse_unsigned_tenths(s: &str) -> Option<i32> {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, "0"),
    };
    let whole: i32 = whole.parse().ok()?;
    let frac: i32 = frac.get(0..1).unwrap_or("0").parse().ok()?;
    Some(whole * 10 + frac)
}

fn parse_date_ddmmmyy(s: &str) -> Option<NaiveDate> {
    // "24NOV05" -> year 2024, month NOV, day 05
    if s.len() != 7 {
        return None;
    }
    let year: i32 = s[0..2].parse::<i32>().ok()? + 2000;
    let month = match &s[2..5] {
        "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" => 7,
        "AUG" => 8,
        "SEP" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DEC" => 12,
        _ => return None,
    };
    let day: u32 = s[5..7].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_ticker() {
        let t = parse_event_ticker("KXNBAGAME-24NOV05LALBOS").unwrap();
        assert_eq!(t.away, "LAL");
        assert_eq!(t.home, "BOS");
        assert_eq!(t.date, NaiveDate::from_ymd_opt(2024, 11, 5).unwrap());
    }

    #[test]
    fn parses_lowercase_event_ticker() {
        let t = parse_event_ticker("kxnbagame-24nov05lalbos").unwrap();
        assert_eq!(t.away, "LAL");
    }

    #[test]
    fn rejects_missing_prefix() {
        assert_eq!(
            parse_event_ticker("NOPE-24NOV05LALBOS"),
            Err(TickerError::MissingPrefix("NOPE-24NOV05LALBOS".to_string()))
        );
    }

    #[test]
    fn parses_moneyline_yes_suffix() {
        let m = parse_market_ticker("KXNBAGAME-24NOV05LALBOS-Y").unwrap();
        assert_eq!(m.suffix, MarketSuffix::MoneylineYes);
        assert_eq!(m.event.home, "BOS");
    }

    #[test]
    fn parses_spread_suffix_with_negative_value() {
        let m = parse_market_ticker("KXNBAGAME-24NOV05LALBOS-SPREAD-BOS-5.5").unwrap();
        match m.suffix {
            MarketSuffix::Spread { team, value_tenths } => {
                assert_eq!(team, ['B', 'O', 'S']);
                assert_eq!(value_tenths, -55);
            }
            _ => panic!("expected spread suffix"),
        }
    }

    #[test]
    fn parses_total_over_suffix() {
        let m = parse_market_ticker("KXNBAGAME-24NOV05LALBOS-TOTAL-O224.5").unwrap();
        match m.suffix {
            MarketSuffix::TotalOver { value_tenths } => assert_eq!(value_tenths, 2245),
            _ => panic!("expected total-over suffix"),
        }
    }

    #[test]
    fn parses_away_moneyline_suffix() {
        let m = parse_market_ticker("KXNBAGAME-24NOV05LALBOS-AWAY-Y").unwrap();
        assert_eq!(m.suffix, MarketSuffix::AwayMoneylineYes);
        assert!(m.suffix.is_moneyline());
        assert!(m.suffix.is_away_moneyline());
    }

    #[test]
    fn standard_tickers_cover_home_and_away() {
        let tickers = standard_market_tickers("KXNBAGAME-24NOV05LALBOS");
        assert_eq!(tickers.len(), 4);
        assert!(tickers.contains(&"KXNBAGAME-24NOV05LALBOS-Y".to_string()));
        assert!(tickers.contains(&"KXNBAGAME-24NOV05LALBOS-AWAY-N".to_string()));
    }

    #[test]
    fn rejects_unrecognized_suffix() {
        assert!(parse_market_ticker("KXNBAGAME-24NOV05LALBOS-WHAT").is_err());
    }
}
