//! Fact rows written by the fact writer once their references are resolved.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::entity::Identity;

/// A game row. `id` is the feed's game id, which is also the primary key.
///
/// Participants, venue, week, season and start time are write-once; everything in
/// [`GameState`] is overwritten by the newest observation.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRow {
    pub id: i64,
    pub season_id: Option<Identity>,
    pub week: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub away_team_id: Identity,
    pub home_team_id: Identity,
    pub venue_id: Option<Identity>,
    pub venue_allegiance: Option<String>,
    pub state: GameState,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameState {
    pub ended_time: Option<DateTime<Utc>>,
    pub schedule_status: Option<String>,
    pub played_status: Option<String>,
    pub attendance: Option<i32>,
    pub weather: Weather,
    pub away_score_total: Option<i32>,
    pub home_score_total: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Weather {
    pub weather_type: Option<String>,
    pub description: Option<String>,
    pub wind_speed_mph: Option<f64>,
    pub wind_speed_kph: Option<f64>,
    pub wind_direction_degrees: Option<f64>,
    pub wind_direction_label: Option<String>,
    pub temperature_f: Option<f64>,
    pub temperature_c: Option<f64>,
    pub humidity_percent: Option<f64>,
}

/// Identity-defining fields of an event from a feed without stable game ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub home_participant_id: Identity,
    pub away_participant_id: Identity,
    pub commence_time: DateTime<Utc>,
}

impl EventKey {
    /// Cache key; must match what the sinks return from `load_keys(EntityKind::Event)`.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.home_participant_id,
            self.away_participant_id,
            self.commence_time.timestamp()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub key: EventKey,
    pub external_id: Option<String>,
    pub event_name: String,
    pub sport_id: Identity,
}

/// What a game-odds header observes: a scheduled game or a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OddsTarget {
    Game(i64),
    Event(Identity),
}

/// Natural key of a game-odds header. At most one row exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameOddsKey {
    pub target: OddsTarget,
    pub book_id: Identity,
    pub as_of_time: DateTime<Utc>,
    pub segment: String,
    pub wager_type_id: Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Full,
    FirstHalf,
    SecondHalf,
    FirstQuarter,
    SecondQuarter,
    ThirdQuarter,
    FourthQuarter,
}

impl Segment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Full => "FULL",
            Segment::FirstHalf => "FIRST_HALF",
            Segment::SecondHalf => "SECOND_HALF",
            Segment::FirstQuarter => "FIRST_QUARTER",
            Segment::SecondQuarter => "SECOND_QUARTER",
            Segment::ThirdQuarter => "THIRD_QUARTER",
            Segment::FourthQuarter => "FOURTH_QUARTER",
        }
    }

    /// Market-key period suffix (`h2h_h1` -> `_h1`).
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "h1" => Some(Segment::FirstHalf),
            "h2" => Some(Segment::SecondHalf),
            "q1" => Some(Segment::FirstQuarter),
            "q2" => Some(Segment::SecondQuarter),
            "q3" => Some(Segment::ThirdQuarter),
            "q4" => Some(Segment::FourthQuarter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutcomeType {
    Away,
    Home,
    Draw,
    Over,
    Under,
    Named(String),
}

impl OutcomeType {
    pub fn as_str(&self) -> &str {
        match self {
            OutcomeType::Away => "away",
            OutcomeType::Home => "home",
            OutcomeType::Draw => "draw",
            OutcomeType::Over => "over",
            OutcomeType::Under => "under",
            OutcomeType::Named(name) => name,
        }
    }
}

impl fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A price in the forms the feed supplies. `american` is always present on a stored outcome
/// coming from the schedule feed; event feeds may only supply one form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Price {
    pub american: Option<i32>,
    pub decimal: Option<f64>,
    pub fractional: Option<String>,
}

impl Price {
    /// Event feeds send a single number. Integral values of magnitude 100 or more that
    /// fit an `i32` are American odds; anything else is a decimal price.
    pub fn from_feed(value: f64) -> Self {
        match american_odds(value) {
            Some(american) => Self {
                american: Some(american),
                ..Self::default()
            },
            None => Self {
                decimal: Some(value),
                ..Self::default()
            },
        }
    }
}

fn american_odds(value: f64) -> Option<i32> {
    let in_range = value.abs() >= 100.0 && value.abs() <= f64::from(i32::MAX);
    if !in_range || value.fract() != 0.0 {
        return None;
    }
    i32::try_from(value as i64).ok()
}

/// A single leaf outcome under a game-odds header.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeLine {
    pub outcome_type: OutcomeType,
    pub price: Price,
    pub spread: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OddsRow {
    pub game_odds_id: Identity,
    pub line: OutcomeLine,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn feed_prices_split_american_from_decimal() {
        assert_eq!(Price::from_feed(-150.0).american, Some(-150));
        assert_eq!(Price::from_feed(130.0).american, Some(130));
        let decimal = Price::from_feed(1.91);
        assert_eq!(decimal.american, None);
        assert_eq!(decimal.decimal, Some(1.91));
    }

    #[test]
    fn out_of_range_prices_stay_decimal() {
        let huge = Price::from_feed(3_000_000_000.0);
        assert_eq!(huge.american, None);
        assert_eq!(huge.decimal, Some(3_000_000_000.0));

        let nan = Price::from_feed(f64::NAN);
        assert_eq!(nan.american, None);
        assert!(nan.decimal.is_some_and(f64::is_nan));

        assert_eq!(Price::from_feed(-2_147_483_647.0).american, Some(-2_147_483_647));
    }

    #[test]
    fn event_cache_key_uses_epoch_seconds() {
        let key = EventKey {
            home_participant_id: 3,
            away_participant_id: 9,
            commence_time: Utc.with_ymd_and_hms(2024, 10, 6, 17, 0, 0).unwrap(),
        };
        assert_eq!(key.cache_key(), "3:9:1728234000");
    }
}
