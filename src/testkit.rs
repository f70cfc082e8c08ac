//! Fixtures for driving the loader without a database or a data directory.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::SourceError;
use crate::source::{Document, DocumentFilter, DocumentKind, DocumentSource};

/// A source serving documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: Vec<Document>,
    unavailable: bool,
}

impl StaticSource {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            unavailable: false,
        }
    }

    /// A source whose every `find` fails.
    pub fn unavailable() -> Self {
        Self {
            documents: Vec::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn find(
        &self,
        kind: DocumentKind,
        filter: &DocumentFilter,
    ) -> Result<Vec<Document>, SourceError> {
        if self.unavailable {
            return Err(SourceError::Unavailable("connection refused".to_string()));
        }
        Ok(self
            .documents
            .iter()
            .filter(|doc| doc.kind == kind && filter.matches(&doc.body))
            .cloned()
            .collect())
    }
}

/// A scheduled game in the season feed's shape, with score and weather filled in.
pub fn game(id: i64, away: &str, home: &str, venue: Option<&str>) -> Value {
    let mut game = json!({
        "schedule": {
            "id": id,
            "week": 1,
            "startTime": "2023-09-08T00:20:00Z",
            "awayTeam": {"id": 48, "abbreviation": away},
            "homeTeam": {"id": 50, "abbreviation": home},
            "venueAllegiance": "HOME",
            "scheduleStatus": "NORMAL",
            "playedStatus": "COMPLETED",
            "attendance": 70000,
            "weather": {
                "type": "CLEAR",
                "description": "clear sky",
                "wind": {
                    "speed": {"milesPerHour": 5, "kilometersPerHour": 8},
                    "direction": {"degrees": 180, "label": "S"}
                },
                "temperature": {"fahrenheit": 78, "celsius": 25.6},
                "humidityPercent": 48
            }
        },
        "score": {"awayScoreTotal": 20, "homeScoreTotal": 21}
    });
    if let Some(venue) = venue {
        game["schedule"]["venue"] = json!({"id": 79, "name": venue, "city": "Kansas City"});
    }
    game
}

pub fn season_document(season: i64, season_type: &str, games: Vec<Value>) -> Document {
    Document::new(
        DocumentKind::Season,
        format!("seasons/{}-{}.json", season, season_type.to_lowercase()),
        json!({
            "season": season,
            "season_type": season_type,
            "response": {"games": games}
        }),
    )
}

/// A moneyline entry; `None` prices are sent as JSON nulls.
pub fn moneyline(as_of_time: &str, away: Option<i64>, home: Option<i64>, draw: Option<i64>) -> Value {
    json!({
        "asOfTime": as_of_time,
        "moneyLine": {
            "awayLine": {"american": away},
            "homeLine": {"american": home},
            "drawLine": {"american": draw}
        }
    })
}

/// One book's lines for a game.
pub fn game_lines(game_id: i64, book: &str, money_lines: Vec<Value>) -> Value {
    json!({
        "game": {"id": game_id},
        "lines": [{
            "source": {"name": book, "region": "US", "isOnlineSportsbook": true, "isLasVegas": false},
            "moneyLines": money_lines
        }]
    })
}

pub fn odds_document(game_lines: Vec<Value>) -> Document {
    Document::new(
        DocumentKind::Odds,
        "odds/week-1.json",
        json!({
            "season": 2023,
            "season_type": "REG",
            "week": 1,
            "response": {"gameLines": game_lines}
        }),
    )
}
