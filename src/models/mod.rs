use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Sentinel published in place of a reading that could not be extracted.
pub const UNKNOWN: &str = "Unknown";

// ── Day ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Day {
    Today,
    Tomorrow,
}

impl Day {
    pub const BOTH: [Day; 2] = [Day::Today, Day::Tomorrow];

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Today => "today",
            Day::Tomorrow => "tomorrow",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Day::Today => "Today",
            Day::Tomorrow => "Tomorrow",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── DataPoint ─────────────────────────────────────────────────────────────────

/// One day's reading for one indicator.
///
/// `value` and `phrase` are either both extracted or both [`UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    pub phrase: String,
    /// Air quality only: the category label printed beside the index.
    /// Published inside the `<day>_air_value` attribute as
    /// `"<value> - <category>"`, never as an attribute of its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl DataPoint {
    pub fn new(value: impl Into<String>, phrase: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            phrase: phrase.into(),
            category: None,
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.value == UNKNOWN && self.phrase == UNKNOWN
    }
}

/// Embedded records carry the value as either `"2.1"` or `2.1`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

// ── Forecast ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub today: DataPoint,
    pub tomorrow: DataPoint,
}

impl Forecast {
    pub fn unknown() -> Self {
        Self {
            today: DataPoint::unknown(),
            tomorrow: DataPoint::unknown(),
        }
    }

    pub fn day(&self, day: Day) -> &DataPoint {
        match day {
            Day::Today => &self.today,
            Day::Tomorrow => &self.tomorrow,
        }
    }
}

// ── Published state ───────────────────────────────────────────────────────────

/// One entity written to the home-automation state store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedState {
    #[serde(rename = "entity_id")]
    pub name: String,
    pub state: String,
    pub attributes: Map<String, Value>,
}

impl PublishedState {
    pub fn new(name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: state.into(),
            attributes: Map::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), Value::String(value.into()));
        self
    }
}

#[cfg(test)]
impl PublishedState {
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_point_accepts_numeric_value() {
        let p: DataPoint = serde_json::from_str(r#"{"value":3,"phrase":"Moderate"}"#).unwrap();
        assert_eq!(p, DataPoint::new("3", "Moderate"));

        let p: DataPoint = serde_json::from_str(r#"{"value":"2.1","phrase":"Low"}"#).unwrap();
        assert_eq!(p, DataPoint::new("2.1", "Low"));

        assert!(serde_json::from_str::<DataPoint>(r#"{"value":null,"phrase":"Low"}"#).is_err());
        assert!(serde_json::from_str::<DataPoint>(r#"{"value":"1"}"#).is_err());
    }

    #[test]
    fn test_unknown_pair() {
        let f = Forecast::unknown();
        assert!(f.day(Day::Today).is_unknown());
        assert!(f.day(Day::Tomorrow).is_unknown());
        assert!(!DataPoint::new("1", UNKNOWN).is_unknown());
    }
}
