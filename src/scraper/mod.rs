pub mod cleaner;
pub mod dom;
pub mod http_client;
pub mod script;

use crate::catalog::{self, Indicator, IndicatorSet};
use crate::config::{PageLayout, SourceConfig};
use crate::models::Forecast;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use self::http_client::{FetchError, HttpClient};
use self::script::{LifestyleRecord, RecordLocator};

// ── Errors ────────────────────────────────────────────────────────────────────

/// The embedded forecast record could not be read. Always fatal for the
/// refresh cycle; there is no `Unknown` fallback for script pages.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("malformed forecast record on {set} page: {reason}")]
    MalformedRecord { set: String, reason: String },

    #[error("forecast record on {set} page has no {category:?} entry")]
    MissingCategory { set: String, category: String },
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable page source.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> Result<String, FetchError>;
}

#[async_trait]
impl PageSource for HttpClient {
    async fn fetch_page(&self, url: &Url) -> Result<String, FetchError> {
        self.get_text(url.as_str()).await
    }
}

// ── URLs ──────────────────────────────────────────────────────────────────────

/// `base/lang/country/city/{postcode}/{page}/{id}[?name=...]`
pub fn page_url(source: &SourceConfig, set: &IndicatorSet) -> Result<Url, FetchError> {
    let raw = format!(
        "{}/{}/{}/{}/{}/{}/{}",
        source.base_url.trim_end_matches('/'),
        source.lang,
        source.country,
        source.city,
        source.effective_postcode(),
        set.page,
        source.location_id,
    );
    let mut url = Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(raw.clone(), e))?;
    if let Some(name) = set.query {
        url.query_pairs_mut().append_pair("name", name);
    }
    Ok(url)
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// A cached page, ready to answer for each indicator it carries.
pub enum ParsedPage {
    Dom(String),
    Script(LifestyleRecord),
}

impl ParsedPage {
    /// Script pages are parsed here, once; DOM pages per indicator.
    pub fn parse(
        layout: PageLayout,
        set_key: &str,
        html: String,
        locator: &dyn RecordLocator,
    ) -> Result<Self, ExtractError> {
        match layout {
            PageLayout::Dom => Ok(ParsedPage::Dom(html)),
            PageLayout::Script => LifestyleRecord::parse(set_key, &html, locator).map(ParsedPage::Script),
        }
    }

    pub fn forecast(&self, indicator: &Indicator) -> Result<Forecast, ExtractError> {
        match self {
            ParsedPage::Dom(html) => {
                let f = dom::extract(html, indicator.fragment);
                if f.today.is_unknown() {
                    debug!("{}: not enough fragments, publishing Unknown", indicator.key);
                }
                Ok(f)
            }
            ParsedPage::Script(record) => record.forecast(indicator.key),
        }
    }
}

/// Extract every indicator carried by one set's page, in catalog order.
pub fn extract_set(
    layout: PageLayout,
    set_key: &str,
    html: String,
    locator: &dyn RecordLocator,
) -> Result<Vec<(&'static Indicator, Forecast)>, ExtractError> {
    let page = ParsedPage::parse(layout, set_key, html, locator)?;
    catalog::indicators_in(layout, set_key)
        .map(|ind| page.forecast(ind).map(|f| (ind, f)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DOM_SETS, SCRIPT_SETS};
    use crate::models::DataPoint;
    use crate::scraper::script::Positional;

    #[test]
    fn test_page_url_with_query() {
        let source = SourceConfig::default();
        let ragweed = DOM_SETS.iter().find(|s| s.key == "ragweed").unwrap();
        assert_eq!(
            page_url(&source, ragweed).unwrap().as_str(),
            "https://www.accuweather.com/en/au/canberra/21921/allergies-weather/21921?name=ragweed-pollen"
        );
    }

    #[test]
    fn test_page_url_uses_postcode() {
        let source = SourceConfig {
            postcode: Some("2600".into()),
            base_url: "https://www.accuweather.com/".into(),
            ..SourceConfig::default()
        };
        let asthma = SCRIPT_SETS.iter().find(|s| s.key == "asthma").unwrap();
        assert_eq!(
            page_url(&source, asthma).unwrap().as_str(),
            "https://www.accuweather.com/en/au/canberra/2600/asthma-weather/21921"
        );
    }

    #[test]
    fn test_page_url_rejects_bad_base() {
        let source = SourceConfig {
            base_url: "not a url".into(),
            ..SourceConfig::default()
        };
        assert!(matches!(page_url(&source, &DOM_SETS[0]), Err(FetchError::InvalidUrl(..))));
    }

    #[test]
    fn test_extract_script_set_covers_all_indicators() {
        let html = r#"<script></script><script></script><script>var a;var b;lifestyleForecast = {
            "common-cold":[{"value":"3","phrase":"Moderate"},{"value":"4","phrase":"High"}],
            "flu":[{"value":"1","phrase":"Low"},{"value":"2","phrase":"Low"}]
        };</script>"#;
        let out = extract_set(PageLayout::Script, "coldflu", html.to_string(), &Positional).unwrap();
        let keys: Vec<_> = out.iter().map(|(i, _)| i.key).collect();
        assert_eq!(keys, ["common-cold", "flu"]);
        assert_eq!(out[0].1.tomorrow, DataPoint::new("4", "High"));
    }

    #[test]
    fn test_extract_script_set_fails_on_missing_category() {
        let html = r#"<script></script><script></script><script>var a;var b;lifestyleForecast = {
            "flu":[{"value":"1","phrase":"Low"},{"value":"2","phrase":"Low"}]
        };</script>"#;
        let err = extract_set(PageLayout::Script, "coldflu", html.to_string(), &Positional).unwrap_err();
        assert!(matches!(err, ExtractError::MissingCategory { .. }));
    }

    #[test]
    fn test_extract_dom_set_degrades_to_unknown() {
        let out = extract_set(PageLayout::Dom, "sinus", "<p>gone</p>".into(), &Positional).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1, Forecast::unknown());
    }
}
