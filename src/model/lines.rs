//! Per-week game-line documents (`odds` collection).
//!
//! A book's line carries up to three wager groups. Each group entry is modeled as
//! one [`WagerLine`] variant so the walker dispatches on the wager kind exactly once.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{int_or_string, null_as_default, Lenient};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OddsDocument {
    #[serde(deserialize_with = "int_or_string")]
    pub season: Option<i64>,
    pub season_type: Option<String>,
    pub week: Option<i32>,
    #[serde(deserialize_with = "null_as_default")]
    pub response: LinesResponse,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinesResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub game_lines: Vec<Lenient<GameLines>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameLines {
    pub game: Option<LineGame>,
    #[serde(deserialize_with = "null_as_default")]
    pub lines: Vec<Lenient<BookLine>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LineGame {
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookLine {
    pub source: Option<BookSource>,
    #[serde(deserialize_with = "null_as_default")]
    pub money_lines: Vec<Lenient<MoneyLineEntry>>,
    #[serde(deserialize_with = "null_as_default")]
    pub point_spreads: Vec<Lenient<PointSpreadEntry>>,
    #[serde(deserialize_with = "null_as_default")]
    pub over_unders: Vec<Lenient<OverUnderEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookSource {
    pub name: Option<String>,
    pub region: Option<String>,
    pub is_online_sportsbook: Option<bool>,
    pub is_las_vegas: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinePrice {
    #[serde(deserialize_with = "int_or_string")]
    pub american: Option<i64>,
    pub decimal: Option<f64>,
    pub fractional: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MoneyLineEntry {
    pub as_of_time: Option<DateTime<Utc>>,
    pub money_line: Option<MoneyLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MoneyLine {
    pub game_segment: Option<String>,
    pub away_line: Option<LinePrice>,
    pub home_line: Option<LinePrice>,
    pub draw_line: Option<LinePrice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PointSpreadEntry {
    pub as_of_time: Option<DateTime<Utc>>,
    pub point_spread: Option<PointSpread>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PointSpread {
    pub game_segment: Option<String>,
    pub away_spread: Option<f64>,
    pub away_line: Option<LinePrice>,
    pub home_spread: Option<f64>,
    pub home_line: Option<LinePrice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverUnderEntry {
    pub as_of_time: Option<DateTime<Utc>>,
    pub over_under: Option<OverUnder>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverUnder {
    pub game_segment: Option<String>,
    pub over_under: Option<f64>,
    pub over_line: Option<LinePrice>,
    pub under_line: Option<LinePrice>,
}

#[derive(Debug, Clone, Copy)]
pub enum WagerLine<'a> {
    MoneyLine(&'a MoneyLine),
    PointSpread(&'a PointSpread),
    OverUnder(&'a OverUnder),
}

impl WagerLine<'_> {
    /// Wager-type natural key stored in `wager_types`.
    pub fn key(&self) -> &'static str {
        match self {
            WagerLine::MoneyLine(_) => "moneyline",
            WagerLine::PointSpread(_) => "point_spread",
            WagerLine::OverUnder(_) => "over_under",
        }
    }

    pub fn game_segment(&self) -> Option<&str> {
        match self {
            WagerLine::MoneyLine(l) => l.game_segment.as_deref(),
            WagerLine::PointSpread(l) => l.game_segment.as_deref(),
            WagerLine::OverUnder(l) => l.game_segment.as_deref(),
        }
    }
}

/// One timestamped wager entry, or the reason it could not be read.
pub type WagerEntry<'a> = Result<(Option<DateTime<Utc>>, Option<WagerLine<'a>>), &'a str>;

impl BookLine {
    /// Wager entries in load order: moneylines, then point spreads, then over/unders.
    pub fn wagers(&self) -> impl Iterator<Item = WagerEntry<'_>> + '_ {
        let money = self.money_lines.iter().map(|e| {
            e.parsed()
                .map(|e| (e.as_of_time, e.money_line.as_ref().map(WagerLine::MoneyLine)))
        });
        let spreads = self.point_spreads.iter().map(|e| {
            e.parsed()
                .map(|e| (e.as_of_time, e.point_spread.as_ref().map(WagerLine::PointSpread)))
        });
        let totals = self.over_unders.iter().map(|e| {
            e.parsed()
                .map(|e| (e.as_of_time, e.over_under.as_ref().map(WagerLine::OverUnder)))
        });
        money.chain(spreads).chain(totals)
    }
}
