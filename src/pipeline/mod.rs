//! Orchestrator: ties page source → cache → extraction → publisher together.
//!
//! ## Run modes
//!
//! `load()` — startup and "rebuild" flag:
//!   1. If the cache has never been filled (no `updated` stamp), fetch every page first.
//!   2. Rebuild every sensor from the cache.
//!
//! `refresh()` — daily schedule and "fetch" flag: fetch every page, then rebuild.
//!
//! Every step is sequential. Any error aborts the batch; the cache is only
//! ever ahead of the published states, so re-running is always safe.

pub mod schedule;

use crate::catalog;
use crate::config::AppConfig;
use crate::hass::FlagControl;
use crate::catalog::Indicator;
use crate::models::Forecast;
use crate::publisher::{Publisher, StateSink};
use crate::scraper::script::{self, RecordLocator};
use crate::scraper::{PageSource, extract_set, page_url};
use crate::storage::Cache;
use crate::utils::Timer;
use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

pub struct Orchestrator<'a> {
    config: &'a AppConfig,
    cache: Cache,
    source: &'a dyn PageSource,
    publisher: Publisher<'a>,
    locator: Box<dyn RecordLocator>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub pages_fetched: usize,
    pub sensors_published: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a AppConfig, source: &'a dyn PageSource, sink: &'a dyn StateSink) -> Self {
        Self {
            config,
            cache: Cache::new(&config.cache.path),
            source,
            publisher: Publisher::new(sink, config.hass.entity_prefix.clone()),
            locator: script::locator(config.source.locator),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Bootstrap-if-empty, then rebuild.
    pub async fn load(&self) -> Result<RunStats> {
        let mut stats = RunStats::default();
        if !self.cache.has_updated().context("Failed to read cache")? {
            info!("Cache is empty, fetching all pages first");
            stats.pages_fetched = self.fetch_all().await?;
        }
        stats.sensors_published = self.rebuild().await?;
        Ok(stats)
    }

    /// Fetch fresh pages, then rebuild.
    pub async fn refresh(&self) -> Result<RunStats> {
        let pages_fetched = self.fetch_all().await?;
        let sensors_published = self.rebuild().await?;
        Ok(RunStats {
            pages_fetched,
            sensors_published,
        })
    }

    /// GET every page of the configured layout into the cache.
    pub async fn fetch_all(&self) -> Result<usize> {
        let _t = Timer::start("Fetch all pages");
        let sets = catalog::sets_for(self.config.source.layout);

        for set in sets {
            let url = page_url(&self.config.source, set)?;
            info!("request {}", url);

            let html = self
                .source
                .fetch_page(&url)
                .await
                .with_context(|| format!("Failed to fetch {} page", set.key))?;
            self.cache
                .put(set.key, &html)
                .with_context(|| format!("Failed to cache {} page", set.key))?;

            let stamp = self.cache.put_updated_timestamp(Local::now())?;
            self.publisher.publish_last_sourced(&stamp).await?;
        }

        Ok(sets.len())
    }

    /// Extract every indicator from the cached pages, one page read per set.
    pub fn extract_all(&self) -> Result<Vec<(&'static Indicator, Forecast)>> {
        let layout = self.config.source.layout;
        let mut out = Vec::new();

        for set in catalog::sets_for(layout) {
            let html = self
                .cache
                .get(set.key)
                .with_context(|| format!("No cached page for {}", set.key))?;
            let forecasts = extract_set(layout, set.key, html, self.locator.as_ref())
                .with_context(|| format!("Failed to extract {} page", set.key))?;
            out.extend(forecasts);
        }

        Ok(out)
    }

    /// Republish every sensor from the cache.
    pub async fn rebuild(&self) -> Result<usize> {
        let _t = Timer::start("Rebuild sensors");
        let forecasts = self.extract_all()?;

        for (indicator, forecast) in &forecasts {
            self.publisher
                .publish_forecast(indicator, forecast)
                .await
                .with_context(|| format!("Failed to publish {}", indicator.key))?;
        }

        let stamp = self.cache.updated_timestamp()?;
        self.publisher.publish_last_sourced(&stamp).await?;

        let published = forecasts.len() * 2 + 1;
        info!("Published {} sensors (data last sourced {})", published, stamp);
        Ok(published)
    }

    /// "Fetch" flag turned on: refresh, then clear the flag.
    pub async fn on_fetch_flag(&self, flags: &dyn FlagControl) -> Result<RunStats> {
        let stats = self.refresh().await?;
        flags.turn_off(&self.config.hass.fetch_flag).await?;
        Ok(stats)
    }

    /// "Rebuild" flag turned on: load from cache, then clear the flag.
    pub async fn on_rebuild_flag(&self, flags: &dyn FlagControl) -> Result<RunStats> {
        let stats = self.load().await?;
        flags.turn_off(&self.config.hass.rebuild_flag).await?;
        Ok(stats)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::scraper::http_client::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use url::Url;

    /// Serves canned pages by the path segment after the location.
    #[derive(Default)]
    pub struct FakeSource {
        pub pages: HashMap<String, String>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub fn count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch_page(&self, url: &Url) -> Result<String, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            let page = url.path_segments().and_then(|mut s| s.nth(4)).unwrap_or_default();
            self.pages
                .get(page)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: reqwest::StatusCode::NOT_FOUND,
                })
        }
    }

    #[derive(Default)]
    pub struct FakeFlags {
        pub on: Mutex<Vec<String>>,
        pub turned_off: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FlagControl for FakeFlags {
        async fn is_on(&self, entity_id: &str) -> Result<bool> {
            Ok(self.on.lock().unwrap().iter().any(|e| e == entity_id))
        }

        async fn turn_off(&self, entity_id: &str) -> Result<()> {
            self.on.lock().unwrap().retain(|e| e != entity_id);
            self.turned_off.lock().unwrap().push(entity_id.to_string());
            Ok(())
        }
    }
}
