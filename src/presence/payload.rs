//! The presence payload and the lock that shares it between the tick
//! updater and the watchdog

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Longest text line the presence service accepts
pub const MAX_LINE_CHARS: usize = 128;

/// A self-consistent presence status, ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresencePayload {
    pub details: String,
    pub state: String,
    pub large_image_key: Option<String>,
    pub large_image_text: Option<String>,
    pub small_image_key: Option<String>,
    pub small_image_text: Option<String>,
    /// Epoch seconds, fixed when the payload is created
    pub start_timestamp: i64,
}

impl PresencePayload {
    pub fn new(start_timestamp: i64) -> Self {
        Self {
            details: String::new(),
            state: String::new(),
            large_image_key: None,
            large_image_text: None,
            small_image_key: None,
            small_image_text: None,
            start_timestamp,
        }
    }

    pub fn set_text(&mut self, details: &str, state: &str) {
        self.details = truncate_line(details);
        self.state = truncate_line(state);
    }

    pub fn set_assets(&mut self, assets: Assets) {
        self.large_image_key = assets.large_key;
        self.large_image_text = assets.large_text;
        self.small_image_key = assets.small_key;
        self.small_image_text = assets.small_text;
    }
}

/// Image keys and tooltips for one update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assets {
    pub large_key: Option<String>,
    pub large_text: Option<String>,
    pub small_key: Option<String>,
    pub small_text: Option<String>,
}

fn truncate_line(line: &str) -> String {
    match line.char_indices().nth(MAX_LINE_CHARS) {
        Some((end, _)) => line[..end].to_string(),
        None => line.to_string(),
    }
}

struct Inner {
    payload: PresencePayload,
    revision: u64,
}

/// Presence payload shared across threads.
///
/// Every mutation and every snapshot takes the same lock, so a snapshot
/// never observes half of an update.
#[derive(Clone)]
pub struct SharedPresence {
    inner: Arc<Mutex<Inner>>,
}

impl SharedPresence {
    /// Create a payload whose start timestamp is the current time
    pub fn new() -> Self {
        Self::with_start(chrono::Utc::now().timestamp())
    }

    pub fn with_start(start_timestamp: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                payload: PresencePayload::new(start_timestamp),
                revision: 0,
            })),
        }
    }

    /// Apply a batch of field changes as one atomic update
    pub fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut PresencePayload),
    {
        let mut inner = self.lock();
        let start = inner.payload.start_timestamp;
        apply(&mut inner.payload);
        inner.payload.start_timestamp = start;
        inner.revision += 1;
    }

    pub fn snapshot(&self) -> PresencePayload {
        self.lock().payload.clone()
    }

    /// Number of updates applied so far
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SharedPresence {
    fn default() -> Self {
        Self::new()
    }
}
