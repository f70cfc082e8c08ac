//! Typed document models and the normalized rows derived from them.

pub mod entity;
pub mod events;
pub mod facts;
pub mod lines;
pub mod roster;
pub mod season;

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

pub use entity::{EntityAttributes, EntityKind, EntityRef, Identity, PlayerAttributes, SeasonType};
pub use facts::{
    EventKey, EventRow, GameOddsKey, GameRow, GameState, OddsRow, OddsTarget, OutcomeLine,
    OutcomeType, Price, Segment, Weather,
};

/// A subtree that is parsed on its own, so one malformed game or line does not
/// fail the whole document it sits in.
#[derive(Debug, Clone)]
pub struct Lenient<T>(pub Result<T, String>);

impl<T> Lenient<T> {
    pub fn parsed(&self) -> Result<&T, &str> {
        self.0.as_ref().map_err(String::as_str)
    }
}

impl<T> From<T> for Lenient<T> {
    fn from(value: T) -> Self {
        Lenient(Ok(value))
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Lenient(
            serde_json::from_value(raw).map_err(|e| e.to_string()),
        ))
    }
}

/// An explicit `null` reads as the default, the same as a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Feeds send years and ids both as numbers and as strings.
pub(crate) fn int_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected integer, got {}", n))),
        Some(Value::String(s)) => s
            .trim()
            .trim_start_matches('+')
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected integer, got '{}'", s))),
        Some(other) => Err(D::Error::custom(format!("expected integer, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "int_or_string")]
        year: Option<i64>,
        #[serde(default, deserialize_with = "null_as_default")]
        items: Vec<Lenient<Item>>,
    }

    #[derive(Debug, Deserialize)]
    struct Item {
        id: i64,
    }

    #[test]
    fn lenient_items_keep_their_siblings() {
        let holder: Holder = serde_json::from_value(json!({
            "year": "2023",
            "items": [{"id": 1}, {"id": "not a number"}, {"id": 3}]
        }))
        .unwrap();

        assert_eq!(holder.year, Some(2023));
        assert_eq!(holder.items[0].parsed().unwrap().id, 1);
        assert!(holder.items[1].parsed().is_err());
        assert_eq!(holder.items[2].parsed().unwrap().id, 3);
    }

    #[test]
    fn signed_strings_parse_as_integers() {
        let holder: Holder = serde_json::from_value(json!({"year": "+130", "items": []})).unwrap();
        assert_eq!(holder.year, Some(130));
    }

    #[test]
    fn null_collections_read_as_empty() {
        let holder: Holder = serde_json::from_value(json!({"items": null})).unwrap();
        assert!(holder.items.is_empty());
        let holder: Holder = serde_json::from_value(json!({})).unwrap();
        assert!(holder.items.is_empty());
    }
}
