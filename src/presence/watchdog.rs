//! Background task that owns the transport connection.
//!
//! Every period it either republishes the latest payload (connected) or
//! tries to connect (disconnected). A fixed period is the only backoff.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

use super::payload::SharedPresence;
use super::traits::{ConnectionState, Transport, TransportEvent};

/// How often the payload is republished and reconnects are attempted
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(5);

/// Timeout for waiting for the presence service handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest shutdown will wait for the loop to disconnect
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct WatchdogTiming {
    pub period: Duration,
    pub handshake_timeout: Duration,
}

impl Default for WatchdogTiming {
    fn default() -> Self {
        Self {
            period: UPDATE_INTERVAL,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }
}

/// Handle to a running watchdog loop
pub struct WatchdogHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that follows every connection state change
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Stop the loop and disconnect if a connection is open.
    ///
    /// Waits at most [`SHUTDOWN_TIMEOUT`]; failures are logged, never raised.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Presence watchdog ended abnormally: {}", e),
            Err(_) => tracing::warn!("Presence watchdog did not stop in time"),
        }
    }
}

/// Spawn the watchdog on the current tokio runtime
pub fn spawn_watchdog<T: Transport>(
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    presence: SharedPresence,
) -> WatchdogHandle {
    spawn_watchdog_with(transport, events, presence, WatchdogTiming::default())
}

pub fn spawn_watchdog_with<T: Transport>(
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    presence: SharedPresence,
    timing: WatchdogTiming,
) -> WatchdogHandle {
    let cancel = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    let watchdog = Watchdog {
        transport,
        presence,
        state: state_tx,
        timing,
        connecting_since: None,
        attempted: false,
    };
    let task = tokio::spawn(watchdog.run(events, cancel.clone()));

    WatchdogHandle {
        cancel,
        state: state_rx,
        task,
    }
}

struct Watchdog<T> {
    transport: T,
    presence: SharedPresence,
    state: watch::Sender<ConnectionState>,
    timing: WatchdogTiming,
    connecting_since: Option<Instant>,
    attempted: bool,
}

impl<T: Transport> Watchdog<T> {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.timing.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(event) = events.recv() => self.handle_event(event).await,
                _ = ticker.tick() => self.on_period().await,
            }
        }

        self.disconnect_for_shutdown().await;
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&mut self, next: ConnectionState) {
        if next != ConnectionState::Connecting {
            self.connecting_since = None;
        }
        self.state.send_replace(next);
    }

    async fn on_period(&mut self) {
        match self.current() {
            ConnectionState::Connected => self.publish().await,
            ConnectionState::Disconnected => self.try_connect().await,
            ConnectionState::Connecting => {
                let stalled = self
                    .connecting_since
                    .is_some_and(|since| since.elapsed() >= self.timing.handshake_timeout);
                if stalled {
                    tracing::warn!("Presence service handshake timed out");
                    if let Err(e) = self.transport.disconnect().await {
                        tracing::debug!("Failed to drop stalled connection: {}", e);
                    }
                    self.set_state(ConnectionState::Disconnected);
                }
            }
        }
    }

    async fn try_connect(&mut self) {
        let first = !self.attempted;
        self.attempted = true;

        match self.transport.connect().await {
            Ok(()) => {
                tracing::debug!("Presence service connecting...");
                self.set_state(ConnectionState::Connecting);
                self.connecting_since = Some(Instant::now());
            }
            Err(e) if first => {
                tracing::warn!("Failed initial presence service connection: {}", e);
            }
            // Not running is the common case, keep it out of the logs
            Err(e) => tracing::trace!("Presence service connect failed: {}", e),
        }
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        let current = self.current();
        match event {
            TransportEvent::Ready(identity) if current == ConnectionState::Connecting => {
                tracing::info!("Presence service ready as {}", identity.username);
                self.set_state(ConnectionState::Connected);
                self.publish().await;
            }
            TransportEvent::Ready(identity) => {
                tracing::debug!(
                    "Dropping ready for {} while {:?}",
                    identity.username,
                    current
                );
            }
            TransportEvent::Error(error) if current == ConnectionState::Disconnected => {
                tracing::debug!("Dropping transport error while disconnected: {}", error);
            }
            TransportEvent::Error(error) => {
                report_transport_error(&error);
                self.set_state(ConnectionState::Disconnected);
            }
            TransportEvent::Closed => {
                if current != ConnectionState::Disconnected {
                    tracing::info!("Presence service closed the connection");
                    self.set_state(ConnectionState::Disconnected);
                }
            }
        }
    }

    async fn publish(&mut self) {
        let payload = self.presence.snapshot();
        match self.transport.send(&payload).await {
            Ok(()) => {}
            // The session is gone without an error event; reconnect next period
            Err(TransportError::NotConnected) => {
                tracing::debug!("Presence session lost, reconnecting");
                self.set_state(ConnectionState::Disconnected);
            }
            Err(e) => tracing::debug!("Failed to publish presence: {}", e),
        }
    }

    async fn disconnect_for_shutdown(&mut self) {
        if self.current() == ConnectionState::Disconnected {
            return;
        }

        match self.transport.disconnect().await {
            Ok(()) => tracing::info!("Presence service disconnected"),
            Err(e) => tracing::debug!("Presence disconnect on shutdown failed: {}", e),
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

fn report_transport_error(error: &TransportError) {
    match error {
        TransportError::Remote { code, message } => {
            tracing::error!(code, message = %message, "Presence service error");
        }
        other => tracing::error!(error = %other, "Presence transport error"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::presence::payload::PresencePayload;
    use crate::presence::traits::Identity;

    const PERIOD: Duration = Duration::from_secs(5);

    #[derive(Default)]
    pub(crate) struct StubStats {
        connects: AtomicUsize,
        disconnects: AtomicUsize,
        sent: Mutex<Vec<PresencePayload>>,
    }

    impl StubStats {
        pub(crate) fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        pub(crate) fn disconnects(&self) -> usize {
            self.disconnects.load(Ordering::SeqCst)
        }

        pub(crate) fn sends(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub(crate) fn last_sent(&self) -> Option<PresencePayload> {
            self.sent.lock().unwrap().last().cloned()
        }
    }

    /// Transport that refuses the first `failures` connects, then becomes
    /// ready right away unless `silent` is set. With `session_lost` every
    /// send fails as if the client went away.
    pub(crate) struct StubTransport {
        failures: usize,
        silent: bool,
        session_lost: bool,
        events: mpsc::UnboundedSender<TransportEvent>,
        stats: Arc<StubStats>,
    }

    impl StubTransport {
        pub(crate) fn failing(
            failures: usize,
        ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
            let (events, rx) = mpsc::unbounded_channel();
            let stub = Self {
                failures,
                silent: false,
                session_lost: false,
                events,
                stats: Arc::default(),
            };
            (stub, rx)
        }

        pub(crate) fn silent() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
            let (mut stub, rx) = Self::failing(0);
            stub.silent = true;
            (stub, rx)
        }

        pub(crate) fn session_lost() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
            let (mut stub, rx) = Self::failing(0);
            stub.session_lost = true;
            (stub, rx)
        }

        pub(crate) fn stats(&self) -> Arc<StubStats> {
            Arc::clone(&self.stats)
        }

        pub(crate) fn events(&self) -> mpsc::UnboundedSender<TransportEvent> {
            self.events.clone()
        }
    }

    impl Transport for StubTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let attempt = self.stats.connects.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(TransportError::ServiceUnavailable(
                    "no discord-ipc socket".to_string(),
                ));
            }
            if !self.silent {
                let identity = Identity {
                    username: "Nep".to_string(),
                };
                self.events.send(TransportEvent::Ready(identity)).ok();
            }
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.stats.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&self, payload: &PresencePayload) -> Result<(), TransportError> {
            if self.session_lost {
                return Err(TransportError::NotConnected);
            }
            self.stats.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn timing() -> WatchdogTiming {
        WatchdogTiming {
            period: PERIOD,
            handshake_timeout: Duration::from_secs(10),
        }
    }

    async fn wait_for_state(handle: &WatchdogHandle, within: Duration, wanted: ConnectionState) {
        let mut state = handle.subscribe();
        tokio::time::timeout(within, state.wait_for(|s| *s == wanted))
            .await
            .expect("state not reached in time")
            .expect("watchdog dropped its state");
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_failures_and_publishes_once_on_ready() {
        let (transport, events) = StubTransport::failing(2);
        let stats = transport.stats();
        let presence = SharedPresence::with_start(42);
        presence.update(|p| p.set_text("Nep | 18.0", "15 | overworld"));

        let handle = spawn_watchdog_with(transport, events, presence, timing());

        // iterations at 0s, 5s and 10s
        wait_for_state(&handle, PERIOD * 2 + Duration::from_secs(1), ConnectionState::Connected)
            .await;
        tokio::task::yield_now().await;
        assert_eq!(stats.connects(), 3);
        assert_eq!(stats.sends(), 1);
        let sent = stats.last_sent().unwrap();
        assert_eq!(sent.details, "Nep | 18.0");
        assert_eq!(sent.start_timestamp, 42);

        tokio::time::sleep(PERIOD + Duration::from_millis(1)).await;
        assert_eq!(stats.sends(), 2);
        assert_eq!(stats.connects(), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connects_are_not_retried_faster_than_the_period() {
        let (transport, events) = StubTransport::failing(usize::MAX);
        let stats = transport.stats();
        let handle = spawn_watchdog_with(transport, events, SharedPresence::with_start(0), timing());

        tokio::time::sleep(PERIOD * 3 + Duration::from_millis(1)).await;
        assert_eq!(stats.connects(), 4);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(stats.sends(), 0);

        handle.shutdown().await;
        assert_eq!(stats.disconnects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_while_connected_disconnects_once() {
        let (transport, events) = StubTransport::failing(0);
        let stats = transport.stats();
        let handle = spawn_watchdog_with(transport, events, SharedPresence::with_start(0), timing());

        wait_for_state(&handle, PERIOD, ConnectionState::Connected).await;
        let mut state = handle.subscribe();
        handle.shutdown().await;

        assert_eq!(stats.disconnects(), 1);
        assert_eq!(*state.borrow_and_update(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_drops_to_disconnected_and_retries() {
        let (transport, events) = StubTransport::failing(0);
        let stats = transport.stats();
        let inject = transport.events();
        let handle = spawn_watchdog_with(transport, events, SharedPresence::with_start(0), timing());

        wait_for_state(&handle, PERIOD, ConnectionState::Connected).await;
        inject
            .send(TransportEvent::Error(TransportError::Remote {
                code: 4000,
                message: "invalid payload".to_string(),
            }))
            .unwrap();
        wait_for_state(&handle, PERIOD, ConnectionState::Disconnected).await;
        assert_eq!(stats.disconnects(), 0);
        assert_eq!(stats.connects(), 1);

        wait_for_state(&handle, PERIOD * 2, ConnectionState::Connected).await;
        assert_eq!(stats.connects(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_handshake_is_abandoned() {
        let (transport, events) = StubTransport::silent();
        let stats = transport.stats();
        let handle = spawn_watchdog_with(transport, events, SharedPresence::with_start(0), timing());

        wait_for_state(&handle, Duration::from_secs(1), ConnectionState::Connecting).await;
        wait_for_state(&handle, PERIOD * 3, ConnectionState::Disconnected).await;
        assert_eq!(stats.disconnects(), 1);
        assert_eq!(stats.sends(), 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ready_while_disconnected_is_dropped() {
        let (transport, events) = StubTransport::failing(usize::MAX);
        let stats = transport.stats();
        let inject = transport.events();
        let identity = Identity {
            username: "Nep".to_string(),
        };
        inject.send(TransportEvent::Ready(identity.clone())).unwrap();
        let handle = spawn_watchdog_with(transport, events, SharedPresence::with_start(0), timing());

        tokio::time::sleep(PERIOD + Duration::from_millis(1)).await;
        inject.send(TransportEvent::Ready(identity)).unwrap();
        tokio::time::sleep(PERIOD * 5).await;

        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(stats.connects(), 7);
        assert_eq!(stats.sends(), 0);

        handle.shutdown().await;
        assert_eq!(stats.disconnects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_ready_after_handshake_timeout_is_dropped() {
        let (transport, events) = StubTransport::silent();
        let stats = transport.stats();
        let inject = transport.events();
        let handle = spawn_watchdog_with(transport, events, SharedPresence::with_start(0), timing());

        wait_for_state(&handle, Duration::from_secs(1), ConnectionState::Connecting).await;
        // abandoned at the 10s iteration
        wait_for_state(&handle, PERIOD * 3, ConnectionState::Disconnected).await;
        let identity = Identity {
            username: "Nep".to_string(),
        };
        inject.send(TransportEvent::Ready(identity)).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(stats.sends(), 0);

        // the next period starts a fresh attempt
        wait_for_state(&handle, PERIOD, ConnectionState::Connecting).await;
        assert_eq!(stats.connects(), 2);
        assert_eq!(stats.sends(), 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stale_error_restarts_the_handshake_clock() {
        let (transport, events) = StubTransport::silent();
        let stats = transport.stats();
        let inject = transport.events();
        let handle = spawn_watchdog_with(transport, events, SharedPresence::with_start(0), timing());

        wait_for_state(&handle, Duration::from_secs(1), ConnectionState::Connecting).await;
        inject
            .send(TransportEvent::Error(TransportError::Io("broken pipe".to_string())))
            .unwrap();
        wait_for_state(&handle, Duration::from_secs(1), ConnectionState::Disconnected).await;

        // reconnect at 5s; its handshake may run until 15s
        wait_for_state(&handle, PERIOD, ConnectionState::Connecting).await;
        assert_eq!(stats.connects(), 2);
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(handle.state(), ConnectionState::Connecting);
        assert_eq!(stats.disconnects(), 0);

        wait_for_state(&handle, PERIOD, ConnectionState::Disconnected).await;
        assert_eq!(stats.disconnects(), 1);

        // errors while already disconnected change nothing
        inject.send(TransportEvent::Closed).unwrap();
        inject
            .send(TransportEvent::Error(TransportError::Io("broken pipe".to_string())))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(stats.sends(), 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lost_session_on_send_drops_to_disconnected() {
        let (transport, events) = StubTransport::session_lost();
        let stats = transport.stats();
        let handle = spawn_watchdog_with(transport, events, SharedPresence::with_start(0), timing());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(stats.connects(), 1);

        tokio::time::sleep(PERIOD).await;
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(stats.connects(), 2);
        assert_eq!(stats.sends(), 0);

        handle.shutdown().await;
        assert_eq!(stats.disconnects(), 0);
    }
}
