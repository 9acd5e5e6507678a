//! Discord Rich Presence transport using discord-sdk

use std::time::{Duration, UNIX_EPOCH};

use discord_sdk::{
    activity::{ActivityBuilder, Assets},
    wheel::{UserSpoke, UserState, Wheel},
    Discord, Subscriptions,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::presence::{Identity, PresencePayload, Transport, TransportEvent};

use super::ipc;

/// A live SDK client plus the task relaying its user state
struct Session {
    discord: Discord,
    forwarder: JoinHandle<()>,
}

/// Publishes presence payloads to the local Discord client
pub struct DiscordTransport {
    app_id: i64,
    events: mpsc::UnboundedSender<TransportEvent>,
    session: Mutex<Option<Session>>,
}

impl DiscordTransport {
    /// Ready/error notifications are delivered on `events`
    pub fn new(app_id: i64, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            app_id,
            events,
            session: Mutex::new(None),
        }
    }

    async fn close(session: Session) {
        session.forwarder.abort();
        session.discord.disconnect().await;
    }
}

impl Transport for DiscordTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        if !ipc::endpoint_available() {
            return Err(TransportError::ServiceUnavailable(
                "no Discord IPC endpoint found".to_string(),
            ));
        }

        let mut session = self.session.lock().await;
        if let Some(stale) = session.take() {
            Self::close(stale).await;
        }

        let (wheel, handler) = Wheel::new(Box::new(|err| {
            tracing::warn!("Discord error: {:?}", err);
        }));
        let user_spoke = wheel.user();

        let discord = Discord::new(self.app_id, Subscriptions::ACTIVITY, Box::new(handler))
            .map_err(|e| TransportError::ServiceUnavailable(e.to_string()))?;

        tracing::debug!("Discord connecting...");

        let forwarder = tokio::spawn(forward_user_state(user_spoke, self.events.clone()));
        *session = Some(Session { discord, forwarder });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let session = self.session.lock().await.take();
        match session {
            Some(session) => {
                Self::close(session).await;
                Ok(())
            }
            None => Err(TransportError::NotConnected),
        }
    }

    async fn send(&self, payload: &PresencePayload) -> Result<(), TransportError> {
        let session = self.session.lock().await;
        let Some(session) = session.as_ref() else {
            return Err(TransportError::NotConnected);
        };

        session
            .discord
            .update_activity(activity_for(payload))
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}

/// Relay SDK user state changes as transport events until either side goes away
async fn forward_user_state(
    mut user_spoke: UserSpoke,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while user_spoke.0.changed().await.is_ok() {
        let event = match &*user_spoke.0.borrow() {
            UserState::Connected(user) => TransportEvent::Ready(Identity {
                username: user.username.clone(),
            }),
            UserState::Disconnected(err) => {
                TransportEvent::Error(TransportError::Io(format!("Discord disconnected: {:?}", err)))
            }
        };

        if events.send(event).is_err() {
            break;
        }
    }
}

fn activity_for(payload: &PresencePayload) -> ActivityBuilder {
    let started = UNIX_EPOCH + Duration::from_secs(payload.start_timestamp.max(0) as u64);
    let mut activity = ActivityBuilder::new().start_timestamp(started);

    if !payload.details.is_empty() {
        activity = activity.details(payload.details.clone());
    }
    if !payload.state.is_empty() {
        activity = activity.state(payload.state.clone());
    }

    let mut assets = Assets::default();
    if let Some(key) = &payload.large_image_key {
        assets = assets.large(key.clone(), payload.large_image_text.clone());
    }
    if let Some(key) = &payload.small_image_key {
        assets = assets.small(key.clone(), payload.small_image_text.clone());
    }

    activity.assets(assets)
}
