//! Reader for the script-driven page layout.
//!
//! The page embeds `lifestyleForecast = {...};` inside an inline script.
//! Where exactly is a property of the source site, not of JavaScript, so
//! finding it sits behind [`RecordLocator`]; the rest of this module only
//! sees the isolated literal.

use crate::config::LocatorKind;
use crate::models::{DataPoint, Forecast};
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::ExtractError;

static SCRIPT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

const RECORD_NAME: &str = "lifestyleForecast";
const SCRIPT_INDEX: usize = 2;
const SEGMENT_INDEX: usize = 2;

/// Finds the text of the forecast literal inside a parsed page.
pub trait RecordLocator: Send + Sync {
    fn locate(&self, doc: &Html) -> Result<String, String>;
}

/// Third `<script>` in document order, third `var` segment.
pub struct Positional;

/// First `<script>` mentioning the record name, wherever it is.
pub struct Anchored;

impl RecordLocator for Positional {
    fn locate(&self, doc: &Html) -> Result<String, String> {
        let script = doc
            .select(&SCRIPT)
            .nth(SCRIPT_INDEX)
            .ok_or_else(|| format!("page has no script #{}", SCRIPT_INDEX))?;
        let text: String = script.text().collect();

        let segment = text
            .split("var ")
            .nth(SEGMENT_INDEX)
            .ok_or_else(|| format!("script has no var segment #{}", SEGMENT_INDEX))?;

        literal_after_name(segment)
    }
}

impl RecordLocator for Anchored {
    fn locate(&self, doc: &Html) -> Result<String, String> {
        doc.select(&SCRIPT)
            .map(|s| s.text().collect::<String>())
            .find(|t| t.contains(RECORD_NAME))
            .ok_or_else(|| format!("no script mentions {}", RECORD_NAME))
            .and_then(|t| literal_after_name(&t))
    }
}

/// `... lifestyleForecast = {...};` → `{...}`
fn literal_after_name(segment: &str) -> Result<String, String> {
    let at = segment
        .find(RECORD_NAME)
        .ok_or_else(|| format!("{} not assigned in segment", RECORD_NAME))?;
    let rest = &segment[at + RECORD_NAME.len()..];
    let rest = rest
        .trim_start()
        .strip_prefix('=')
        .ok_or_else(|| format!("{} is not followed by '='", RECORD_NAME))?;

    let literal = rest.trim().trim_end_matches(';').trim_end();
    if literal.is_empty() {
        return Err("empty forecast literal".into());
    }
    Ok(literal.to_string())
}

pub fn locator(kind: LocatorKind) -> Box<dyn RecordLocator> {
    match kind {
        LocatorKind::Positional => Box::new(Positional),
        LocatorKind::Anchored => Box::new(Anchored),
    }
}

/// The parsed forecast literal of one page: category key → [today, tomorrow].
#[derive(Debug, Clone)]
pub struct LifestyleRecord {
    set: String,
    entries: Map<String, Value>,
}

impl LifestyleRecord {
    /// Parse a page once; categories are then looked up with [`Self::forecast`].
    pub fn parse(set: &str, html: &str, locator: &dyn RecordLocator) -> Result<Self, ExtractError> {
        let malformed = |reason: String| ExtractError::MalformedRecord {
            set: set.to_string(),
            reason,
        };

        let doc = Html::parse_document(html);
        let literal = locator.locate(&doc).map_err(malformed)?;

        // Only the first value counts; anything after the literal is page script.
        let value = serde_json::Deserializer::from_str(&literal)
            .into_iter::<Value>()
            .next()
            .ok_or_else(|| malformed("empty forecast literal".into()))?
            .map_err(|e| malformed(format!("forecast literal is not valid JSON: {}", e)))?;

        match value {
            Value::Object(entries) => Ok(Self {
                set: set.to_string(),
                entries,
            }),
            other => Err(malformed(format!("forecast literal is not an object: {}", kind(&other)))),
        }
    }

    pub fn forecast(&self, category: &str) -> Result<Forecast, ExtractError> {
        let raw = self
            .entries
            .get(category)
            .ok_or_else(|| ExtractError::MissingCategory {
                set: self.set.clone(),
                category: category.to_string(),
            })?;

        let points: Vec<DataPoint> =
            serde_json::from_value(raw.clone()).map_err(|e| ExtractError::MalformedRecord {
                set: self.set.clone(),
                reason: format!("{}: {}", category, e),
            })?;

        let mut points = points.into_iter();
        match (points.next(), points.next()) {
            (Some(today), Some(tomorrow)) => Ok(Forecast { today, tomorrow }),
            _ => Err(ExtractError::MalformedRecord {
                set: self.set.clone(),
                reason: format!("{}: fewer than two days", category),
            }),
        }
    }
}

#[cfg(test)]
impl LifestyleRecord {
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = r#"var a=1;var b=2;lifestyleForecast = {"asthma":[{"value":"2.1","phrase":"Low"},{"value":"3.0","phrase":"Moderate"}]};"#;

    fn page(third_script: &str) -> String {
        format!(
            "<html><head><script>var gtm = 1;</script><script src='x.js'></script>\
             <script>{}</script></head><body></body></html>",
            third_script
        )
    }

    #[test]
    fn test_positional_reads_asthma() {
        let rec = LifestyleRecord::parse("asthma", &page(BLOCK), &Positional).unwrap();
        let f = rec.forecast("asthma").unwrap();
        assert_eq!(f.today, DataPoint::new("2.1", "Low"));
        assert_eq!(f.tomorrow, DataPoint::new("3.0", "Moderate"));
    }

    #[test]
    fn test_one_record_serves_many_categories() {
        let block = r#"var x;var y;lifestyleForecast = {
            "ragweed-pollen":[{"value":1,"phrase":"Low"},{"value":2,"phrase":"Low"}],
            "air-quality":[{"value":"40","phrase":"Fair"},{"value":"61","phrase":"Poor"}]
        };
        window.ready = true;"#;
        let rec = LifestyleRecord::parse("allergies", &page(block), &Positional).unwrap();
        assert_eq!(rec.categories().count(), 2);
        assert_eq!(rec.forecast("ragweed-pollen").unwrap().tomorrow, DataPoint::new("2", "Low"));
        assert_eq!(rec.forecast("air-quality").unwrap().tomorrow, DataPoint::new("61", "Poor"));
    }

    #[test]
    fn test_missing_category_is_an_error() {
        let rec = LifestyleRecord::parse("asthma", &page(BLOCK), &Positional).unwrap();
        let err = rec.forecast("sinus").unwrap_err();
        assert!(matches!(err, ExtractError::MissingCategory { ref category, .. } if category == "sinus"));
    }

    #[test]
    fn test_too_few_scripts_is_malformed() {
        let html = format!("<html><head><script>{}</script></head></html>", BLOCK);
        let err = LifestyleRecord::parse("asthma", &html, &Positional).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedRecord { .. }));
    }

    #[test]
    fn test_anchored_finds_record_anywhere() {
        let html = format!("<html><head><script>{}</script></head></html>", BLOCK);
        let rec = LifestyleRecord::parse("asthma", &html, &Anchored).unwrap();
        assert_eq!(rec.forecast("asthma").unwrap().today, DataPoint::new("2.1", "Low"));
    }

    #[test]
    fn test_broken_literal_is_malformed() {
        let block = "var a;var b;lifestyleForecast = {\"asthma\": [;";
        let err = LifestyleRecord::parse("asthma", &page(block), &Positional).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedRecord { .. }));

        let block = "var a;var b;lifestyleForecast = [1, 2];";
        let err = LifestyleRecord::parse("asthma", &page(block), &Positional).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedRecord { ref reason, .. } if reason.contains("array")));
    }

    #[test]
    fn test_single_day_is_malformed() {
        let block = r#"var a;var b;lifestyleForecast = {"flu":[{"value":"1","phrase":"Low"}]};"#;
        let rec = LifestyleRecord::parse("coldflu", &page(block), &Positional).unwrap();
        assert!(matches!(rec.forecast("flu"), Err(ExtractError::MalformedRecord { .. })));
    }
}
