//! Turns forecasts into named states and hands them to a sink.

use crate::catalog::Indicator;
use crate::models::{Day, Forecast, PublishedState};
use anyhow::Result;
use async_trait::async_trait;

/// Where published states go. Every call replaces the entity's previous
/// state and attributes outright.
#[async_trait]
pub trait StateSink: Send + Sync {
    async fn publish(&self, state: &PublishedState) -> Result<()>;
}

/// Prints each state as one JSON line.
pub struct StdoutSink;

#[async_trait]
impl StateSink for StdoutSink {
    async fn publish(&self, state: &PublishedState) -> Result<()> {
        println!("{}", serde_json::to_string(state)?);
        Ok(())
    }
}

pub struct Publisher<'a> {
    sink: &'a dyn StateSink,
    prefix: String,
}

impl<'a> Publisher<'a> {
    pub fn new(sink: &'a dyn StateSink, prefix: impl Into<String>) -> Self {
        Self {
            sink,
            prefix: prefix.into(),
        }
    }

    /// `sensor.<prefix>_<slug>_<day>`
    pub fn entity_id(&self, indicator: &Indicator, day: Day) -> String {
        format!("sensor.{}_{}_{}", self.prefix, indicator.slug, day)
    }

    pub fn state_for(&self, indicator: &Indicator, forecast: &Forecast, day: Day) -> PublishedState {
        let point = forecast.day(day);
        // Air quality shows "<index> - <category>" in the value attribute;
        // the state itself stays the bare index.
        let value_attr = match &point.category {
            Some(category) => format!("{} - {}", point.value, category),
            None => point.value.clone(),
        };
        PublishedState::new(self.entity_id(indicator, day), point.value.clone())
            .attr("icon", indicator.icon)
            .attr("friendly_name", format!("{} {}", indicator.label, day.title()))
            .attr(format!("{}_{}_value", day, indicator.attr), value_attr)
            .attr(format!("{}_{}_phrase", day, indicator.attr), point.phrase.clone())
    }

    /// Publish today and tomorrow for one indicator.
    pub async fn publish_forecast(&self, indicator: &Indicator, forecast: &Forecast) -> Result<()> {
        for day in Day::BOTH {
            self.sink.publish(&self.state_for(indicator, forecast, day)).await?;
        }
        Ok(())
    }

    /// `sensor.<prefix>_data_last_sourced`
    pub async fn publish_last_sourced(&self, stamp: &str) -> Result<()> {
        let state = PublishedState::new(format!("sensor.{}_data_last_sourced", self.prefix), stamp)
            .attr("icon", "mdi:timeline-clock-outline")
            .attr("friendly_name", "ACC Allergy Data last sourced");
        self.sink.publish(&state).await
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every publish, latest state per entity wins.
    #[derive(Default)]
    pub struct MemorySink {
        pub log: Mutex<Vec<PublishedState>>,
    }

    impl MemorySink {
        pub fn published(&self) -> Vec<PublishedState> {
            self.log.lock().unwrap().clone()
        }

        pub fn latest(&self, name: &str) -> Option<PublishedState> {
            self.published().into_iter().rev().find(|s| s.name == name)
        }
    }

    #[async_trait]
    impl StateSink for MemorySink {
        async fn publish(&self, state: &PublishedState) -> Result<()> {
            self.log.lock().unwrap().push(state.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemorySink;
    use super::*;
    use crate::catalog::INDICATORS;
    use crate::models::{DataPoint, UNKNOWN};

    fn indicator(key: &str) -> &'static Indicator {
        INDICATORS.iter().find(|i| i.key == key).unwrap()
    }

    #[tokio::test]
    async fn test_publishes_today_and_tomorrow() {
        let sink = MemorySink::default();
        let publisher = Publisher::new(&sink, "acc");
        let forecast = Forecast {
            today: DataPoint::new("4", "High"),
            tomorrow: DataPoint::new("2", "Low"),
        };

        publisher.publish_forecast(indicator("ragweed-pollen"), &forecast).await.unwrap();

        let states = sink.published();
        assert_eq!(states.len(), 2);
        let today = &states[0];
        assert_eq!(today.name, "sensor.acc_ragweed_pollen_today");
        assert_eq!(today.state, "4");
        assert_eq!(today.attr_str("icon"), Some("mdi:clover"));
        assert_eq!(today.attr_str("friendly_name"), Some("Ragweed Pollen Today"));
        assert_eq!(today.attr_str("today_ragweed_value"), Some("4"));
        assert_eq!(today.attr_str("today_ragweed_phrase"), Some("High"));

        let tomorrow = &states[1];
        assert_eq!(tomorrow.name, "sensor.acc_ragweed_pollen_tomorrow");
        assert_eq!(tomorrow.attr_str("tomorrow_ragweed_phrase"), Some("Low"));
        assert_eq!(tomorrow.attributes.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_pair_is_published() {
        let sink = MemorySink::default();
        let publisher = Publisher::new(&sink, "acc");
        publisher.publish_forecast(indicator("common-cold"), &Forecast::unknown()).await.unwrap();

        let s = sink.latest("sensor.acc_common_cold_tomorrow").unwrap();
        assert_eq!(s.state, UNKNOWN);
        assert_eq!(s.attr_str("tomorrow_common_value"), Some(UNKNOWN));
        assert_eq!(s.attr_str("tomorrow_common_phrase"), Some(UNKNOWN));
    }

    #[test]
    fn test_air_value_carries_category() {
        let sink = MemorySink::default();
        let publisher = Publisher::new(&sink, "acc");
        let forecast = Forecast {
            today: DataPoint::new("41", "Take care.").with_category("Fair"),
            tomorrow: DataPoint::unknown(),
        };
        let s = publisher.state_for(indicator("air-quality"), &forecast, Day::Today);
        assert_eq!(s.name, "sensor.acc_air_today");
        assert_eq!(s.state, "41");
        assert_eq!(s.attr_str("today_air_value"), Some("41 - Fair"));
        assert_eq!(s.attr_str("today_air_phrase"), Some("Take care."));
        assert_eq!(s.attr_str("today_air_category"), None);

        let s = publisher.state_for(indicator("air-quality"), &forecast, Day::Tomorrow);
        assert_eq!(s.state, UNKNOWN);
        assert_eq!(s.attr_str("tomorrow_air_value"), Some(UNKNOWN));
    }

    #[tokio::test]
    async fn test_last_sourced_sensor() {
        let sink = MemorySink::default();
        Publisher::new(&sink, "acc")
            .publish_last_sourced("26/06/2020, 05:07:09")
            .await
            .unwrap();
        let s = sink.latest("sensor.acc_data_last_sourced").unwrap();
        assert_eq!(s.state, "26/06/2020, 05:07:09");
        assert_eq!(s.attr_str("icon"), Some("mdi:timeline-clock-outline"));
    }
}
