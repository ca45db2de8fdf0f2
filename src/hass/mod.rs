//! Home Assistant REST adapter: state sink and trigger flags.

use crate::config::HassConfig;
use crate::models::PublishedState;
use crate::publisher::StateSink;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Boolean helper entities used as edge-triggered requests.
#[async_trait]
pub trait FlagControl: Send + Sync {
    async fn is_on(&self, entity_id: &str) -> Result<bool>;
    async fn turn_off(&self, entity_id: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct EntityState {
    state: String,
}

pub struct HassClient {
    inner: reqwest::Client,
    base_url: String,
    token: String,
}

impl HassClient {
    pub fn new(config: &HassConfig) -> Result<Self> {
        if config.token.is_empty() {
            bail!("hass.token is not set (ACCU__HASS__TOKEN)");
        }
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build Home Assistant client")?;

        Ok(Self {
            inner,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }
}

/// `input_boolean.foo` → `input_boolean`
fn entity_domain(entity_id: &str) -> Result<&str> {
    match entity_id.split_once('.') {
        Some((domain, name)) if !domain.is_empty() && !name.is_empty() => Ok(domain),
        _ => bail!("{:?} is not an entity id", entity_id),
    }
}

#[async_trait]
impl StateSink for HassClient {
    async fn publish(&self, state: &PublishedState) -> Result<()> {
        debug!("set_state {} = {}", state.name, state.state);
        self.inner
            .post(self.url(&format!("states/{}", state.name)))
            .bearer_auth(&self.token)
            .json(&json!({ "state": state.state, "attributes": state.attributes }))
            .send()
            .await
            .with_context(|| format!("POST state {}", state.name))?
            .error_for_status()
            .with_context(|| format!("Home Assistant rejected {}", state.name))?;
        Ok(())
    }
}

#[async_trait]
impl FlagControl for HassClient {
    async fn is_on(&self, entity_id: &str) -> Result<bool> {
        let entity: EntityState = self
            .inner
            .get(self.url(&format!("states/{}", entity_id)))
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("GET state {}", entity_id))?
            .error_for_status()
            .with_context(|| format!("Home Assistant has no {}", entity_id))?
            .json()
            .await
            .with_context(|| format!("Unexpected state body for {}", entity_id))?;
        Ok(entity.state == "on")
    }

    async fn turn_off(&self, entity_id: &str) -> Result<()> {
        let domain = entity_domain(entity_id)?;
        self.inner
            .post(self.url(&format!("services/{}/turn_off", domain)))
            .bearer_auth(&self.token)
            .json(&json!({ "entity_id": entity_id }))
            .send()
            .await
            .with_context(|| format!("turn_off {}", entity_id))?
            .error_for_status()
            .with_context(|| format!("Home Assistant refused to turn off {}", entity_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_domain() {
        assert_eq!(entity_domain("input_boolean.get_allergies_data").unwrap(), "input_boolean");
        assert!(entity_domain("get_allergies_data").is_err());
        assert!(entity_domain(".x").is_err());
    }

    #[test]
    fn test_requires_token() {
        assert!(HassClient::new(&HassConfig::default()).is_err());

        let config = HassConfig {
            token: "abc".into(),
            url: "http://hass.local:8123/".into(),
            ..HassConfig::default()
        };
        let client = HassClient::new(&config).unwrap();
        assert_eq!(client.url("states/sensor.x"), "http://hass.local:8123/api/states/sensor.x");
    }
}
