//! Keeps a Discord Rich Presence status in sync with a running game client.
//!
//! The host calls [`PresenceBridge::on_tick`] from its tick loop; a
//! background watchdog owns the Discord connection and republishes the
//! latest payload on its own schedule.

pub mod config;
pub mod discord;
pub mod error;
pub mod logging;
pub mod presence;

use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;

pub use config::{ConfigStore, PresenceConfig};
pub use error::{ConfigError, TransportError, UnknownDataSource};

use discord::DiscordTransport;
use presence::{
    spawn_watchdog, ConnectionState, HostContext, SharedPresence, TickPhase, TickUpdater,
    Transport, TransportEvent, WatchdogHandle,
};

/// Presence feature wired together: tick updater, shared payload, watchdog
pub struct PresenceBridge {
    updater: TickUpdater,
    presence: SharedPresence,
    watchdog: WatchdogHandle,
}

impl PresenceBridge {
    /// Start publishing to Discord.
    ///
    /// Returns `None` when the feature is disabled in the config. Must be
    /// called from within a tokio runtime.
    pub fn start(
        config: ConfigStore,
        host: Arc<dyn HostContext>,
    ) -> Result<Option<Self>, ConfigError> {
        let current = config.current();
        if !current.is_enabled {
            tracing::info!("Rich presence disabled in config");
            return Ok(None);
        }

        let app_id = current.app_id()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = DiscordTransport::new(app_id, events_tx);

        tracing::info!("Starting rich presence for application {}", app_id);
        Ok(Some(Self::with_transport(config, host, transport, events_rx)))
    }

    pub fn with_transport<T: Transport>(
        config: ConfigStore,
        host: Arc<dyn HostContext>,
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        let presence = SharedPresence::new();
        let watchdog = spawn_watchdog(transport, events, presence.clone());
        let updater = TickUpdater::new(config, host, presence.clone());

        Self {
            updater,
            presence,
            watchdog,
        }
    }

    /// Host tick callback; cheap unless a refresh is due, never does I/O
    pub fn on_tick(&mut self, phase: TickPhase) -> bool {
        self.updater.on_tick(phase)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.watchdog.state()
    }

    pub fn presence(&self) -> &SharedPresence {
        &self.presence
    }

    /// Stop the watchdog, disconnecting if connected
    pub async fn shutdown(self) {
        self.watchdog.shutdown().await;
    }

    /// Blocking variant of [`shutdown`](Self::shutdown) for exit hooks.
    ///
    /// Blocks in place when called from a multi-threaded runtime worker. A
    /// current-thread runtime cannot be blocked, so there the shutdown is
    /// spawned onto `runtime` and this returns before the disconnect.
    pub fn shutdown_blocking(self, runtime: &Handle) {
        match Handle::try_current() {
            Err(_) => runtime.block_on(self.shutdown()),
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| runtime.block_on(self.shutdown()));
            }
            Ok(_) => {
                tracing::warn!("Blocking shutdown on a current-thread runtime, not waiting");
                runtime.spawn(self.shutdown());
            }
        }
    }
}
