//! Session context: the provider/consumer pair over [`SessionStore`].
//!
//! A [`SessionContext`] is constructed once and shared; each consumer asks
//! it for a [`SessionHandle`] bound to one trip. The handle exposes the
//! store operations without repeating the trip id and hands out
//! [`SessionSubscription`]s that yield every new snapshot.

use std::sync::Arc;

use tokio::sync::watch;

use crate::session::{
    ConciergeSession, NewMessage, SessionStore, SessionUpdate, VoiceState,
};

/// Shared provider of session handles.
#[derive(Debug, Clone)]
pub struct SessionContext {
    store: Arc<SessionStore>,
}

impl SessionContext {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Bind a handle to `trip_id`, creating the session if needed.
    pub fn session(&self, trip_id: impl Into<String>, query_limit: u32) -> SessionHandle {
        let trip_id = trip_id.into();
        self.store.get_or_create_session(&trip_id, query_limit);
        SessionHandle {
            store: Arc::clone(&self.store),
            trip_id,
        }
    }
}

/// Consumer view of one trip's session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    store: Arc<SessionStore>,
    trip_id: String,
}

impl SessionHandle {
    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    /// Current snapshot; `None` once the session has been cleared.
    pub fn snapshot(&self) -> Option<ConciergeSession> {
        self.store.get_session(&self.trip_id)
    }

    pub fn update(&self, update: SessionUpdate) -> Option<ConciergeSession> {
        self.store.update_session(&self.trip_id, update)
    }

    pub fn add_message(&self, message: NewMessage) -> Option<ConciergeSession> {
        self.store.add_message(&self.trip_id, message)
    }

    pub fn increment_query_count(&self) -> Option<ConciergeSession> {
        self.store.increment_query_count(&self.trip_id)
    }

    pub fn can_make_query(&self) -> bool {
        self.store.can_make_query(&self.trip_id)
    }

    pub fn set_voice_state(&self, state: VoiceState) -> Option<ConciergeSession> {
        self.store.set_voice_state(&self.trip_id, state)
    }

    pub fn set_last_error(&self, message: impl Into<String>) -> Option<ConciergeSession> {
        self.store.set_last_error(&self.trip_id, message)
    }

    pub fn clear(&self) -> bool {
        self.store.clear_session(&self.trip_id)
    }

    /// Subscribe to snapshots of this trip's session.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.store.subscribe(&self.trip_id),
        }
    }
}

/// Stream of session snapshots. Drop it to unsubscribe.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: watch::Receiver<Option<ConciergeSession>>,
}

impl SessionSubscription {
    /// The latest snapshot, marking it seen.
    pub fn current(&mut self) -> Option<ConciergeSession> {
        self.receiver.borrow_and_update().clone()
    }

    /// Whether a snapshot arrived since the last [`current`](Self::current)
    /// or [`changed`](Self::changed).
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next snapshot. Returns `None` when the store is gone.
    pub async fn changed(&mut self) -> Option<Option<ConciergeSession>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
