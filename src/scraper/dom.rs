//! Reader for the fragment-based page layout.
//!
//! Missing or short fragment lists are not errors: the indicator is
//! published as the `Unknown` pair instead. Values keep whatever padding
//! survives `clean_text`; phrases are the element text as-is.

use crate::catalog::Fragment;
use crate::models::{DataPoint, Forecast};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use super::cleaner::clean_text;

static GAUGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".gauge").unwrap());
static COND: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".cond").unwrap());
static AQ_NUMBER: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".aq-number").unwrap());
static AQ_CATEGORY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".category-text").unwrap());
static AQ_STATEMENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".statement").unwrap());

/// Tomorrow's air-quality block sits two positions after today's.
const AIR_TOMORROW: usize = 2;

fn texts(doc: &Html, sel: &Selector) -> Vec<String> {
    doc.select(sel)
        .map(|el: ElementRef<'_>| el.text().collect::<String>())
        .collect()
}

/// Extract today/tomorrow for one indicator from its page.
pub fn extract(html: &str, fragment: Fragment) -> Forecast {
    let doc = Html::parse_document(html);
    match fragment {
        Fragment::Gauge => extract_gauge(&doc),
        Fragment::AirQuality => extract_air(&doc),
    }
}

fn extract_gauge(doc: &Html) -> Forecast {
    let gauges = texts(doc, &GAUGE);
    let conds = texts(doc, &COND);

    if gauges.len() < 2 || conds.len() < 2 {
        debug!("gauge fragments: {} values, {} conds", gauges.len(), conds.len());
        return Forecast::unknown();
    }

    let point = |i: usize| DataPoint::new(clean_text(&gauges[i]), conds[i].clone());
    Forecast {
        today: point(0),
        tomorrow: point(1),
    }
}

fn extract_air(doc: &Html) -> Forecast {
    let numbers = texts(doc, &AQ_NUMBER);
    let categories = texts(doc, &AQ_CATEGORY);
    let statements = texts(doc, &AQ_STATEMENT);

    let enough = [&numbers, &categories, &statements]
        .iter()
        .all(|v| v.len() > AIR_TOMORROW);
    if numbers.len() < 2 || !enough {
        debug!(
            "air fragments: {} numbers, {} categories, {} statements",
            numbers.len(),
            categories.len(),
            statements.len()
        );
        return Forecast::unknown();
    }

    let point = |i: usize| {
        DataPoint::new(clean_text(&numbers[i]), statements[i].clone())
            .with_category(categories[i].clone())
    };
    Forecast {
        today: point(0),
        tomorrow: point(AIR_TOMORROW),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
