use crate::config::SourceConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} failed recently, skipping for another {remaining:?}")]
    CoolingDown { url: String, remaining: Duration },

    #[error("invalid page URL {0:?}: {1}")]
    InvalidUrl(String, url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Network trouble, rate limiting and server errors are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request { .. } | FetchError::Body { .. } => true,
            FetchError::Status { status, .. } => {
                status.as_u16() == 429 || status.is_server_error()
            }
            _ => false,
        }
    }
}

pub struct HttpClient {
    inner: reqwest::Client,
    config: SourceConfig,
    failures: Mutex<HashMap<String, Instant>>,
}

impl HttpClient {
    pub fn new(config: &SourceConfig) -> Result<Self, FetchError> {
        let inner = reqwest::Client::builder()
            // The site rejects the default reqwest agent.
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            inner,
            config: config.clone(),
            failures: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch a URL as text with bounded retry.
    ///
    /// A URL whose last attempt failed within the cooldown window is not
    /// requested at all.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        if let Some(remaining) = self.cooling_down(url) {
            return Err(FetchError::CoolingDown {
                url: url.to_string(),
                remaining,
            });
        }

        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.config.retry_base_ms)
            .max_delay(Duration::from_secs(30))
            .map(jitter)
            .take(self.config.max_retries);

        let mut attempt = 0u32;
        let result = RetryIf::start(
            strategy,
            || {
                attempt += 1;
                self.get_once(url, attempt)
            },
            |e: &FetchError| {
                let retry = e.is_retryable();
                if retry {
                    warn!("{} (will retry)", e);
                }
                retry
            },
        )
        .await;

        self.record(url, result.is_ok());
        result
    }

    async fn get_once(&self, url: &str, attempt: u32) -> Result<String, FetchError> {
        debug!("GET {} (attempt {})", url, attempt);

        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        resp.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }

    fn cooling_down(&self, url: &str) -> Option<Duration> {
        let cooldown = Duration::from_secs(self.config.failure_cooldown_secs);
        let failures = self.failures.lock().unwrap_or_else(|p| p.into_inner());
        let since = failures.get(url)?.elapsed();
        cooldown.checked_sub(since).filter(|d| !d.is_zero())
    }

    fn record(&self, url: &str, ok: bool) {
        let mut failures = self.failures.lock().unwrap_or_else(|p| p.into_inner());
        if ok {
            failures.remove(url);
        } else {
            failures.insert(url.to_string(), Instant::now());
        }
    }
}
