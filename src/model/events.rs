//! Event odds snapshots from The Odds API (`events` collection).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::facts::Segment;
use super::{null_as_default, Lenient};

/// A historical snapshot wraps the events in `data`; a live pull is a bare event.
#[derive(Debug, Clone, Default)]
pub struct EventSnapshot {
    pub timestamp: Option<DateTime<Utc>>,
    pub events: Vec<Lenient<OddsApiEvent>>,
}

impl EventSnapshot {
    pub fn from_value(body: Value) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Wrapped {
            #[serde(default)]
            timestamp: Option<DateTime<Utc>>,
            #[serde(default, deserialize_with = "null_as_default")]
            data: Vec<Lenient<OddsApiEvent>>,
        }

        if body.get("data").is_some() {
            let wrapped: Wrapped = serde_json::from_value(body)?;
            Ok(Self {
                timestamp: wrapped.timestamp,
                events: wrapped.data,
            })
        } else {
            let event: Lenient<OddsApiEvent> = serde_json::from_value(body)?;
            Ok(Self {
                timestamp: None,
                events: vec![event],
            })
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct OddsApiEvent {
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub sport_key: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sport_title: String,
    pub commence_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub home_team: String,
    #[serde(deserialize_with = "null_as_default")]
    pub away_team: String,
    #[serde(deserialize_with = "null_as_default")]
    pub bookmakers: Vec<Lenient<Bookmaker>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Bookmaker {
    #[serde(deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub last_update: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub markets: Vec<Lenient<Market>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Market {
    pub key: String,
    pub last_update: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Outcome {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub price: Option<f64>,
    pub point: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketKind {
    HeadToHead,
    Spreads,
    Totals,
    Other,
}

/// Split a market key into its base wager type and game segment.
///
/// `spreads_h1` -> (`spreads`, first half); keys without a known period suffix are
/// full-game markets and keep their whole key.
pub fn split_market_key(key: &str) -> (&str, Segment) {
    if let Some((base, suffix)) = key.rsplit_once('_') {
        if let Some(segment) = Segment::from_suffix(suffix) {
            return (base, segment);
        }
    }
    (key, Segment::Full)
}

pub fn market_kind(base: &str) -> MarketKind {
    match base {
        "h2h" => MarketKind::HeadToHead,
        "spreads" | "alternate_spreads" => MarketKind::Spreads,
        "totals" | "alternate_totals" => MarketKind::Totals,
        _ => MarketKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn market_keys_split_into_type_and_segment() {
        assert_eq!(split_market_key("h2h"), ("h2h", Segment::Full));
        assert_eq!(split_market_key("spreads_h1"), ("spreads", Segment::FirstHalf));
        assert_eq!(split_market_key("totals_q4"), ("totals", Segment::FourthQuarter));
        assert_eq!(
            split_market_key("player_pass_tds"),
            ("player_pass_tds", Segment::Full)
        );
    }

    #[test]
    fn snapshot_accepts_wrapped_and_bare_events() {
        let wrapped = EventSnapshot::from_value(json!({
            "timestamp": "2024-10-04T12:00:00Z",
            "data": [{"id": "a", "home_team": "X", "away_team": "Y"}]
        }))
        .unwrap();
        assert!(wrapped.timestamp.is_some());
        assert_eq!(wrapped.events.len(), 1);

        let bare = EventSnapshot::from_value(json!({"id": "b", "home_team": "X"})).unwrap();
        assert!(bare.timestamp.is_none());
        assert_eq!(bare.events[0].parsed().unwrap().id.as_deref(), Some("b"));
    }

    #[test]
    fn null_bookmakers_and_titles_read_as_empty() {
        let snapshot = EventSnapshot::from_value(json!({
            "data": [{
                "home_team": "X",
                "away_team": "Y",
                "bookmakers": [{"key": "fanduel", "title": null, "markets": null}]
            }, {
                "home_team": "X",
                "away_team": "Z",
                "bookmakers": null
            }]
        }))
        .unwrap();

        let first = snapshot.events[0].parsed().unwrap();
        let book = first.bookmakers[0].parsed().unwrap();
        assert_eq!(book.key, "fanduel");
        assert_eq!(book.title, "");
        assert!(book.markets.is_empty());
        assert!(snapshot.events[1].parsed().unwrap().bookmakers.is_empty());
    }
}
