//! Daemon loop: daily refresh plus edge-triggered flag polling.

use super::Orchestrator;
use crate::config::AppConfig;
use crate::hass::FlagControl;
use anyhow::Result;
use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{error, info, warn};

/// Next local occurrence of `at` strictly after `now`.
pub fn next_daily(now: DateTime<Local>, at: NaiveTime) -> DateTime<Local> {
    let mut date = now.date_naive();
    loop {
        let candidate = date.and_time(at);
        // A time skipped by a DST jump resolves to nothing; try the next day.
        if let Some(t) = Local.from_local_datetime(&candidate).earliest() {
            if t > now {
                return t;
            }
        }
        date = match date.checked_add_days(Days::new(1)) {
            Some(d) => d,
            None => return now,
        };
    }
}

fn until(now: DateTime<Local>, next: DateTime<Local>) -> Instant {
    Instant::now() + (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Tracks one boolean flag and reports only off → on transitions.
#[derive(Debug, Default)]
pub struct EdgeTrigger {
    was_on: bool,
}

impl EdgeTrigger {
    pub fn update(&mut self, on: bool) -> bool {
        let rising = on && !self.was_on;
        self.was_on = on;
        rising
    }
}

/// Run until Ctrl-C. Errors from a batch are logged and the loop carries on;
/// the last-sourced sensor simply does not advance.
pub async fn run(orch: &Orchestrator<'_>, flags: &dyn FlagControl, config: &AppConfig) -> Result<()> {
    let daily_at = config.schedule.daily_time()?;

    if let Err(e) = orch.load().await {
        error!("Initial load failed: {:#}", e);
    }

    let mut poll = interval(Duration::from_secs(config.hass.poll_secs.max(1)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut fetch_edge = EdgeTrigger::default();
    let mut rebuild_edge = EdgeTrigger::default();

    let now = Local::now();
    let mut next = next_daily(now, daily_at);
    let mut daily = Box::pin(sleep_until(until(now, next)));
    info!("Next daily refresh at {}", next.format("%Y-%m-%d %H:%M:%S"));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }

            _ = &mut daily => {
                info!("Daily refresh");
                if let Err(e) = orch.refresh().await {
                    error!("Daily refresh failed: {:#}", e);
                }
                let now = Local::now();
                next = next_daily(now, daily_at);
                daily.as_mut().reset(until(now, next));
                info!("Next daily refresh at {}", next.format("%Y-%m-%d %H:%M:%S"));
            }

            _ = poll.tick() => {
                match flags.is_on(&config.hass.fetch_flag).await {
                    Ok(on) if fetch_edge.update(on) => {
                        info!("{} turned on: fetching", config.hass.fetch_flag);
                        if let Err(e) = orch.on_fetch_flag(flags).await {
                            error!("Fetch request failed: {:#}", e);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Could not read {}: {:#}", config.hass.fetch_flag, e),
                }

                match flags.is_on(&config.hass.rebuild_flag).await {
                    Ok(on) if rebuild_edge.update(on) => {
                        info!("{} turned on: rebuilding", config.hass.rebuild_flag);
                        if let Err(e) = orch.on_rebuild_flag(flags).await {
                            error!("Rebuild request failed: {:#}", e);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Could not read {}: {:#}", config.hass.rebuild_flag, e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_next_daily_later_today() {
        let now = Local.with_ymd_and_hms(2024, 3, 10, 4, 0, 0).unwrap();
        let next = next_daily(now, at(5, 7, 0));
        assert_eq!(next.date_naive(), now.date_naive());
        assert_eq!(next.time(), at(5, 7, 0));
    }

    #[test]
    fn test_next_daily_rolls_to_tomorrow() {
        let now = Local.with_ymd_and_hms(2024, 3, 10, 5, 7, 0).unwrap();
        let next = next_daily(now, at(5, 7, 0));
        assert!(next > now);
        assert_eq!(next.time(), at(5, 7, 0));
        assert_eq!(next.date_naive(), now.date_naive().succ_opt().unwrap());
    }

    #[test]
    fn test_edge_trigger_fires_once_per_rise() {
        let mut edge = EdgeTrigger::default();
        assert!(!edge.update(false));
        assert!(edge.update(true));
        assert!(!edge.update(true));
        assert!(!edge.update(false));
        assert!(edge.update(true));
    }
}
