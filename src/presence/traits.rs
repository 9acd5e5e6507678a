use std::future::Future;

use crate::error::TransportError;

use super::payload::PresencePayload;

/// Who the presence service says we are once the handshake completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

/// Asynchronous notifications from a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connect attempt finished its handshake
    Ready(Identity),
    /// The connection failed after it was established
    Error(TransportError),
    /// The service closed the connection
    Closed,
}

/// Connection lifecycle as seen by the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Connect accepted, waiting for the ready event
    Connecting,
    Connected,
}

/// Channel to an external presence service (Discord, or a stub in tests).
///
/// Implementations report readiness and late failures through the event
/// sender they were built with; the watchdog drains those events.
pub trait Transport: Send + Sync + 'static {
    /// Start a connection attempt.
    ///
    /// Fails with [`TransportError::ServiceUnavailable`] when no local
    /// presence service is reachable.
    fn connect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn send(
        &self,
        payload: &PresencePayload,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
