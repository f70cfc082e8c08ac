//! Season schedule documents (`seasons` collection).

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{int_or_string, null_as_default, Lenient};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeasonDocument {
    #[serde(deserialize_with = "int_or_string")]
    pub season: Option<i64>,
    pub season_type: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub response: ScheduleResponse,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub games: Vec<Lenient<ScheduledGame>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduledGame {
    pub schedule: Option<Schedule>,
    pub score: Option<Score>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Schedule {
    pub id: Option<i64>,
    pub week: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub ended_time: Option<DateTime<Utc>>,
    pub away_team: Option<TeamRef>,
    pub home_team: Option<TeamRef>,
    pub venue: Option<VenueRef>,
    pub venue_allegiance: Option<String>,
    pub schedule_status: Option<String>,
    pub played_status: Option<String>,
    pub attendance: Option<i32>,
    pub weather: Option<WeatherReport>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeamRef {
    pub id: Option<i64>,
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VenueRef {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeatherReport {
    #[serde(rename = "type")]
    pub weather_type: Option<String>,
    pub description: Option<String>,
    pub wind: Option<Wind>,
    pub temperature: Option<Temperature>,
    pub humidity_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Wind {
    pub speed: Option<WindSpeed>,
    pub direction: Option<WindDirection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WindSpeed {
    pub miles_per_hour: Option<f64>,
    pub kilometers_per_hour: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WindDirection {
    pub degrees: Option<f64>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Temperature {
    pub fahrenheit: Option<f64>,
    pub celsius: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Score {
    pub away_score_total: Option<i32>,
    pub home_score_total: Option<i32>,
}
