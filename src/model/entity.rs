//! Reference entities: the shared rows facts point at.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Surrogate identity assigned by the sink (a `BIGSERIAL`, or the feed id for games).
pub type Identity = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sport,
    Season,
    Team,
    Venue,
    Book,
    WagerType,
    Participant,
    Player,
    Game,
    Event,
}

impl EntityKind {
    /// Kinds the identity resolver may create on first sight.
    pub const REFERENCE: [EntityKind; 8] = [
        EntityKind::Sport,
        EntityKind::Season,
        EntityKind::Team,
        EntityKind::Venue,
        EntityKind::Book,
        EntityKind::WagerType,
        EntityKind::Participant,
        EntityKind::Player,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Sport => "sport",
            EntityKind::Season => "season",
            EntityKind::Team => "team",
            EntityKind::Venue => "venue",
            EntityKind::Book => "book",
            EntityKind::WagerType => "wager_type",
            EntityKind::Participant => "participant",
            EntityKind::Player => "player",
            EntityKind::Game => "game",
            EntityKind::Event => "event",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeasonType {
    Preseason,
    Regular,
    Playoff,
}

impl SeasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonType::Preseason => "preseason",
            SeasonType::Regular => "regular",
            SeasonType::Playoff => "playoff",
        }
    }
}

impl fmt::Display for SeasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeasonType {
    type Err = String;

    /// Accepts the feed spellings: `PRE`, `REG`, `PST`, `regular`, `playoff`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pre" | "preseason" => Ok(SeasonType::Preseason),
            "reg" | "regular" => Ok(SeasonType::Regular),
            "pst" | "post" | "postseason" | "playoff" | "playoffs" => Ok(SeasonType::Playoff),
            other => Err(format!("unknown season type '{}'", other)),
        }
    }
}

/// Attributes written when a reference entity is first inserted.
///
/// Later sightings of the same natural key never rewrite these.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityAttributes {
    Sport {
        title: Option<String>,
    },
    Season {
        year: i32,
        season_type: SeasonType,
    },
    Team {
        source_id: Option<i64>,
        name: Option<String>,
        city: Option<String>,
    },
    Venue {
        source_id: Option<i64>,
        city: Option<String>,
    },
    Book {
        region: Option<String>,
        is_online: Option<bool>,
        is_las_vegas: Option<bool>,
    },
    WagerType,
    Participant {
        name: String,
        sport_key: String,
        /// Set by the resolver once the sport has an identity.
        sport_id: Option<Identity>,
        participant_type: String,
    },
    Player(PlayerAttributes),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerAttributes {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub jersey_number: Option<i32>,
    pub height: Option<String>,
    pub weight: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub college: Option<String>,
    pub team_id: Option<Identity>,
}

impl EntityAttributes {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityAttributes::Sport { .. } => EntityKind::Sport,
            EntityAttributes::Season { .. } => EntityKind::Season,
            EntityAttributes::Team { .. } => EntityKind::Team,
            EntityAttributes::Venue { .. } => EntityKind::Venue,
            EntityAttributes::Book { .. } => EntityKind::Book,
            EntityAttributes::WagerType => EntityKind::WagerType,
            EntityAttributes::Participant { .. } => EntityKind::Participant,
            EntityAttributes::Player(_) => EntityKind::Player,
        }
    }
}

/// A reference to a shared entity by natural key, with its first-insert attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRef {
    pub natural_key: String,
    pub attributes: EntityAttributes,
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        self.attributes.kind()
    }

    pub fn sport(sport_key: &str, title: Option<&str>) -> Self {
        Self {
            natural_key: normalize_key(sport_key),
            attributes: EntityAttributes::Sport {
                title: title.map(normalize_key),
            },
        }
    }

    pub fn season(year: i32, season_type: SeasonType) -> Self {
        Self {
            natural_key: season_key(year, season_type),
            attributes: EntityAttributes::Season { year, season_type },
        }
    }

    pub fn team(abbreviation: &str, source_id: Option<i64>) -> Self {
        Self {
            natural_key: normalize_key(abbreviation).to_uppercase(),
            attributes: EntityAttributes::Team {
                source_id,
                name: None,
                city: None,
            },
        }
    }

    pub fn venue(name: &str, source_id: Option<i64>, city: Option<String>) -> Self {
        Self {
            natural_key: normalize_key(name),
            attributes: EntityAttributes::Venue { source_id, city },
        }
    }

    pub fn book(
        name: &str,
        region: Option<String>,
        is_online: Option<bool>,
        is_las_vegas: Option<bool>,
    ) -> Self {
        Self {
            natural_key: normalize_key(name),
            attributes: EntityAttributes::Book {
                region,
                is_online,
                is_las_vegas,
            },
        }
    }

    pub fn wager_type(key: &str) -> Self {
        Self {
            natural_key: normalize_key(key).to_lowercase(),
            attributes: EntityAttributes::WagerType,
        }
    }

    pub fn participant(sport_key: &str, name: &str) -> Self {
        let sport_key = normalize_key(sport_key);
        let name = normalize_key(name);
        Self {
            natural_key: participant_key(&sport_key, &name),
            attributes: EntityAttributes::Participant {
                name,
                sport_key,
                sport_id: None,
                participant_type: "TEAM".to_string(),
            },
        }
    }

    /// A participant reference pointing at its resolved sport. Other kinds are unchanged.
    pub fn in_sport(&self, id: Identity) -> Self {
        let mut entity = self.clone();
        if let EntityAttributes::Participant { sport_id, .. } = &mut entity.attributes {
            *sport_id = Some(id);
        }
        entity
    }

    pub fn player(source_id: i64, attributes: PlayerAttributes) -> Self {
        Self {
            natural_key: source_id.to_string(),
            attributes: EntityAttributes::Player(attributes),
        }
    }
}

pub fn season_key(year: i32, season_type: SeasonType) -> String {
    format!("{}-{}", year, season_type)
}

pub fn participant_key(sport_key: &str, name: &str) -> String {
    format!("{}:{}", sport_key, name)
}

/// Collapse runs of whitespace and trim, so `" Fan  Duel "` and `"Fan Duel"` share a key.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
