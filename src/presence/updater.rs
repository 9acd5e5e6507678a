//! Rewrites the shared presence payload from host ticks.
//!
//! Runs on the host's tick thread, so it never touches the transport;
//! publishing is left to the watchdog.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ConfigStore, PresenceConfig};

use super::payload::{Assets, SharedPresence};
use super::sources::{DataSources, HostContext};
use super::template::resolve;

/// Minimum real time between two payload refreshes
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(4);

/// Phase of a host tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Start,
    End,
}

/// Wall-clock throttle, independent of how often the host ticks
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_run: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    /// Returns true, and starts a new window, if the last window has elapsed
    pub fn ready(&mut self, now: Instant) -> bool {
        let elapsed = self
            .last_run
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if elapsed {
            self.last_run = Some(now);
        }
        elapsed
    }
}

pub struct TickUpdater {
    config: ConfigStore,
    host: Arc<dyn HostContext>,
    presence: SharedPresence,
    throttle: Throttle,
}

impl TickUpdater {
    pub fn new(config: ConfigStore, host: Arc<dyn HostContext>, presence: SharedPresence) -> Self {
        Self::with_interval(config, host, presence, REFRESH_INTERVAL)
    }

    pub fn with_interval(
        config: ConfigStore,
        host: Arc<dyn HostContext>,
        presence: SharedPresence,
        interval: Duration,
    ) -> Self {
        Self {
            config,
            host,
            presence,
            throttle: Throttle::new(interval),
        }
    }

    /// Host tick callback. Returns true if the payload was refreshed.
    pub fn on_tick(&mut self, phase: TickPhase) -> bool {
        self.on_tick_at(phase, Instant::now())
    }

    pub fn on_tick_at(&mut self, phase: TickPhase, now: Instant) -> bool {
        if phase != TickPhase::End {
            return false;
        }

        let config = self.config.current();
        if !config.is_enabled || !self.throttle.ready(now) {
            return false;
        }

        self.refresh(&config);
        true
    }

    fn refresh(&self, config: &PresenceConfig) {
        let sources = DataSources::new(self.host.as_ref());
        let assets = assets_for(config, self.host.dimension());
        let (details, state) = resolve(&config.format_spec(), |id| sources.lookup(id));

        tracing::trace!(%details, %state, "Refreshing presence");
        self.presence.update(|payload| {
            payload.set_assets(assets);
            payload.set_text(&details, &state);
        });
    }
}

fn assets_for(config: &PresenceConfig, dimension: Option<String>) -> Assets {
    let large_key = non_empty(&config.large_image)
        .or(dimension)
        .map(|key| asset_key(&key));

    Assets {
        large_key,
        large_text: non_empty(&config.large_text),
        small_key: non_empty(&config.small_image).map(|key| asset_key(&key)),
        small_text: non_empty(&config.small_text),
    }
}

/// Asset keys may not contain ':'
fn asset_key(raw: &str) -> String {
    raw.replace(':', "_")
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
