use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub hass: HassConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Which generation of the forecast page markup to read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageLayout {
    /// `gauge` / `cond` containers, one page per indicator.
    #[default]
    Dom,
    /// `lifestyleForecast` literal embedded in a script block.
    Script,
}

/// How the embedded forecast literal is found inside a script-layout page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    #[default]
    Positional,
    Anchored,
}

/// Forecast source (location + fetch behaviour)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default = "default_country")]
    pub country: String,

    #[serde(default = "default_city")]
    pub city: String,

    #[serde(default = "default_location_id")]
    pub location_id: String,

    /// Some locations are addressed by postcode in the path; falls back to `location_id`.
    #[serde(default)]
    pub postcode: Option<String>,

    #[serde(default)]
    pub layout: PageLayout,

    #[serde(default)]
    pub locator: LocatorKind,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    #[serde(default = "default_failure_cooldown_secs")]
    pub failure_cooldown_secs: u64,
}

/// On-disk page cache
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

/// Home Assistant connection and trigger flags
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HassConfig {
    #[serde(default = "default_hass_url")]
    pub url: String,

    #[serde(default)]
    pub token: String,

    #[serde(default = "default_entity_prefix")]
    pub entity_prefix: String,

    /// Flag that requests a fresh fetch followed by a rebuild.
    #[serde(default = "default_fetch_flag")]
    pub fetch_flag: String,

    /// Flag that requests a rebuild from the cache only.
    #[serde(default = "default_rebuild_flag")]
    pub rebuild_flag: String,

    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
}

/// Daily refresh schedule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Local time of day, `HH:MM:SS`.
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.accuweather.com".to_string()
}
fn default_lang() -> String {
    "en".to_string()
}
fn default_country() -> String {
    "au".to_string()
}
fn default_city() -> String {
    "canberra".to_string()
}
fn default_location_id() -> String {
    "21921".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> usize {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_failure_cooldown_secs() -> u64 {
    900
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("data/allergies.duckdb")
}
fn default_hass_url() -> String {
    "http://localhost:8123".to_string()
}
fn default_entity_prefix() -> String {
    "acc".to_string()
}
fn default_fetch_flag() -> String {
    "input_boolean.get_allergies_data".to_string()
}
fn default_rebuild_flag() -> String {
    "input_boolean.reset_allergies_sensor".to_string()
}
fn default_poll_secs() -> u64 {
    10
}
fn default_daily_at() -> String {
    "05:07:00".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            lang: default_lang(),
            country: default_country(),
            city: default_city(),
            location_id: default_location_id(),
            postcode: None,
            layout: PageLayout::default(),
            locator: LocatorKind::default(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            failure_cooldown_secs: default_failure_cooldown_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { path: default_cache_path() }
    }
}

impl Default for HassConfig {
    fn default() -> Self {
        Self {
            url: default_hass_url(),
            token: String::new(),
            entity_prefix: default_entity_prefix(),
            fetch_flag: default_fetch_flag(),
            rebuild_flag: default_rebuild_flag(),
            poll_secs: default_poll_secs(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { daily_at: default_daily_at() }
    }
}

impl SourceConfig {
    /// Path segment used before the page suffix: the postcode when one is
    /// configured and non-empty, otherwise the location id.
    pub fn effective_postcode(&self) -> &str {
        match self.postcode.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => p,
            _ => &self.location_id,
        }
    }
}

impl ScheduleConfig {
    pub fn daily_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M"))
            .with_context(|| format!("Invalid schedule.daily_at {:?}", self.daily_at))
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("ACCU").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app_cfg.schedule.daily_time()?;
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            cache: CacheConfig::default(),
            hass: HassConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}
