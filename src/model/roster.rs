//! Player roster documents (`rosters` collection).

use chrono::NaiveDate;
use serde::Deserialize;

use super::season::TeamRef;
use super::{null_as_default, Lenient};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RosterDocument {
    #[serde(deserialize_with = "null_as_default")]
    pub players: Vec<Lenient<RosterPlayer>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RosterPlayer {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub primary_position: Option<String>,
    pub jersey_number: Option<i32>,
    pub height: Option<String>,
    pub weight: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub college: Option<String>,
    pub current_team: Option<TeamRef>,
}
