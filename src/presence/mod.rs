mod payload;
mod sources;
mod template;
mod traits;
mod updater;
mod watchdog;

pub use crate::error::UnknownDataSource;
pub use payload::{Assets, PresencePayload, SharedPresence, MAX_LINE_CHARS};
pub use sources::{DataSourceId, DataSources, HostContext, ServerLink};
pub use template::{resolve, FormatSpec, PLACEHOLDER};
pub use traits::{ConnectionState, Identity, Transport, TransportEvent};
pub use updater::{Throttle, TickPhase, TickUpdater, REFRESH_INTERVAL};
pub use watchdog::{
    spawn_watchdog, spawn_watchdog_with, WatchdogHandle, WatchdogTiming, HANDSHAKE_TIMEOUT,
    SHUTDOWN_TIMEOUT, UPDATE_INTERVAL,
};

#[cfg(test)]
pub(crate) use sources::tests::FixedHost;
#[cfg(test)]
pub(crate) use watchdog::tests::StubTransport;
