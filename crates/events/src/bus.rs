//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans [`BookletEvent`]s out to every subscriber. It is shared
//! as `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use hostbook_core::types::{BookletId, DbId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

pub mod event_types {
    pub const BOOKLET_CREATED: &str = "booklet.created";
    pub const BOOKLET_PUBLISHED: &str = "booklet.published";
    pub const BOOKLET_PIN_REGENERATED: &str = "booklet.pin_regenerated";
    pub const BOOKLET_DISABLED: &str = "booklet.disabled";
    pub const BOOKLET_ENABLED: &str = "booklet.enabled";
    pub const BOOKLET_DELETED: &str = "booklet.deleted";
    pub const BOOKLET_AUTOSAVE_FAILED: &str = "booklet.autosave_failed";
}

// ---------------------------------------------------------------------------
// BookletEvent
// ---------------------------------------------------------------------------

/// Something that happened to a booklet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookletEvent {
    /// Dot-separated event name, see [`event_types`].
    pub event_type: String,
    pub booklet_id: Option<BookletId>,
    pub actor_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl BookletEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            booklet_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_booklet(mut self, booklet_id: BookletId) -> Self {
        self.booklet_id = Some(booklet_id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

pub struct EventBus {
    sender: broadcast::Sender<BookletEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity. Slow receivers observe
    /// `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers; dropped when there are none.
    pub fn publish(&self, event: BookletEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookletEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
