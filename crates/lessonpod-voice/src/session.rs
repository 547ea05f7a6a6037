//! Concierge session store.
//!
//! [`SessionStore`] is the single source of truth for a trip's message
//! history, query quota and voice state. Sessions live in an in-memory map
//! (the fast path) and are written through to durable storage under
//! `concierge_session_<trip_id>` so they survive a reload.
//!
//! Every mutation builds a new [`ConciergeSession`] snapshot and returns it
//! by value; callers never hold a reference into the store. Subscribers
//! registered through [`SessionStore::subscribe`] receive each snapshot.
//!
//! Persistence is best-effort: a storage failure is logged, the store
//! switches to [`Persistence::MemoryOnly`], and the in-memory session stays
//! authoritative for the rest of the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use lessonpod_platform::{Clock, KeyValueStore, SystemClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

/// Storage key prefix for persisted sessions.
pub const SESSION_KEY_PREFIX: &str = "concierge_session_";

/// Storage key for `trip_id`.
pub fn session_storage_key(trip_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{trip_id}")
}

/// Voice pipeline state recorded for a session.
///
/// The store enforces no transition table; any state may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceState {
    #[default]
    Idle,
    Connecting,
    Listening,
    Speaking,
    Error,
    FallbackText,
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Listening => "listening",
            Self::Speaking => "speaking",
            Self::Error => "error",
            Self::FallbackText => "fallback_text",
        })
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A message to append; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    /// Defaults to the store's clock when `None`.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Stamp the message with an explicit time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Conversation state for one trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConciergeSession {
    pub trip_id: String,
    /// Append-only, in insertion order.
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
    #[serde(default)]
    pub query_count: u32,
    pub query_limit: u32,
    #[serde(default)]
    pub voice_state: VoiceState,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_error_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_success_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ConciergeSession {
    fn new(trip_id: &str, query_limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            trip_id: trip_id.to_string(),
            messages: Vec::new(),
            query_count: 0,
            query_limit,
            voice_state: VoiceState::Idle,
            last_error: None,
            last_error_at: None,
            last_success_at: None,
            created_at: now,
        }
    }

    /// Queries left before the quota is reached.
    pub fn remaining_queries(&self) -> u32 {
        self.query_limit.saturating_sub(self.query_count)
    }
}

/// Partial update for [`SessionStore::update_session`].
///
/// `trip_id` and `created_at` never change, so they have no field here.
/// Double options distinguish "leave as is" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub messages: Option<Vec<SessionMessage>>,
    pub query_count: Option<u32>,
    pub query_limit: Option<u32>,
    pub voice_state: Option<VoiceState>,
    pub last_error: Option<Option<String>>,
    pub last_error_at: Option<Option<DateTime<Utc>>>,
    pub last_success_at: Option<Option<DateTime<Utc>>>,
}

impl SessionUpdate {
    fn apply(self, session: &mut ConciergeSession) {
        if let Some(messages) = self.messages {
            session.messages = messages;
        }
        if let Some(count) = self.query_count {
            session.query_count = count;
        }
        if let Some(limit) = self.query_limit {
            session.query_limit = limit;
        }
        if let Some(state) = self.voice_state {
            session.voice_state = state;
        }
        if let Some(error) = self.last_error {
            session.last_error = error;
        }
        if let Some(at) = self.last_error_at {
            session.last_error_at = at;
        }
        if let Some(at) = self.last_success_at {
            session.last_success_at = at;
        }
    }
}

/// Whether durable writes are currently landing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    Durable,
    /// The last write failed; sessions only live in memory.
    MemoryOnly,
}

type Subscribers = HashMap<String, watch::Sender<Option<ConciergeSession>>>;

/// Keyed session store with write-through persistence.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, ConciergeSession>>,
    subscribers: Mutex<Subscribers>,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    degraded: AtomicBool,
}

impl SessionStore {
    /// Create a store persisting to `storage`, using the system clock.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock.
    pub fn with_clock(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            storage,
            clock,
            degraded: AtomicBool::new(false),
        }
    }

    /// Return the session for `trip_id`, creating it if neither memory nor
    /// storage has one. `query_limit` only applies on creation.
    pub fn get_or_create_session(&self, trip_id: &str, query_limit: u32) -> ConciergeSession {
        let mut sessions = self.sessions.lock();
        if let Some(existing) = self.lookup(&mut sessions, trip_id) {
            return existing;
        }

        let session = ConciergeSession::new(trip_id, query_limit, self.clock.now());
        debug!(trip_id = %trip_id, query_limit, "created concierge session");
        self.commit(&mut sessions, session.clone());
        session
    }

    /// Read a session without creating it.
    pub fn get_session(&self, trip_id: &str) -> Option<ConciergeSession> {
        let mut sessions = self.sessions.lock();
        self.lookup(&mut sessions, trip_id)
    }

    /// Merge `update` into the session. `None` if the trip has no session.
    pub fn update_session(&self, trip_id: &str, update: SessionUpdate) -> Option<ConciergeSession> {
        self.mutate(trip_id, |session| update.apply(session))
    }

    /// Append a message with a fresh id.
    pub fn add_message(&self, trip_id: &str, message: NewMessage) -> Option<ConciergeSession> {
        let timestamp = message.timestamp.unwrap_or_else(|| self.clock.now());
        let stored = SessionMessage {
            id: message_id(timestamp),
            role: message.role,
            content: message.content,
            timestamp,
        };
        self.mutate(trip_id, move |session| session.messages.push(stored))
    }

    /// Count one successful query. Does not check the quota; callers gate
    /// with [`can_make_query`](Self::can_make_query) first.
    pub fn increment_query_count(&self, trip_id: &str) -> Option<ConciergeSession> {
        let now = self.clock.now();
        self.mutate(trip_id, |session| {
            session.query_count = session.query_count.saturating_add(1);
            session.last_success_at = Some(now);
        })
    }

    /// Whether the trip is under its quota. Unknown trips cannot query.
    ///
    /// Advisory only: the check and the later increment are not atomic.
    pub fn can_make_query(&self, trip_id: &str) -> bool {
        self.get_session(trip_id)
            .is_some_and(|s| s.query_count < s.query_limit)
    }

    /// Record a voice state. Any transition is accepted.
    pub fn set_voice_state(&self, trip_id: &str, state: VoiceState) -> Option<ConciergeSession> {
        self.mutate(trip_id, |session| session.voice_state = state)
    }

    /// Record an error and force the voice state to [`VoiceState::Error`].
    pub fn set_last_error(
        &self,
        trip_id: &str,
        message: impl Into<String>,
    ) -> Option<ConciergeSession> {
        let message = message.into();
        let now = self.clock.now();
        self.mutate(trip_id, move |session| {
            session.last_error = Some(message);
            session.last_error_at = Some(now);
            session.voice_state = VoiceState::Error;
        })
    }

    /// Remove the session from memory and storage. Returns whether it existed.
    pub fn clear_session(&self, trip_id: &str) -> bool {
        let mut sessions = self.sessions.lock();
        let in_memory = sessions.remove(trip_id).is_some();
        let in_storage = match self.storage.remove(&session_storage_key(trip_id)) {
            Ok(existed) => existed,
            Err(e) => {
                warn!(trip_id = %trip_id, error = %e, "failed to remove persisted session");
                false
            }
        };
        self.publish(trip_id, None);
        debug!(trip_id = %trip_id, "cleared concierge session");
        in_memory || in_storage
    }

    /// Watch a trip's session. The receiver starts with the current
    /// snapshot and sees every later one; `None` means no session.
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self, trip_id: &str) -> watch::Receiver<Option<ConciergeSession>> {
        let mut sessions = self.sessions.lock();
        let current = self.lookup(&mut sessions, trip_id);
        let mut subscribers = self.subscribers.lock();
        match subscribers.get(trip_id) {
            Some(sender) => {
                sender.send_replace(current);
                sender.subscribe()
            }
            None => {
                let (sender, receiver) = watch::channel(current);
                subscribers.insert(trip_id.to_string(), sender);
                receiver
            }
        }
    }

    /// Trip ids with a persisted session.
    pub fn stored_trip_ids(&self) -> Vec<String> {
        match self.storage.list_keys(Some(SESSION_KEY_PREFIX)) {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|k| k.strip_prefix(SESSION_KEY_PREFIX).map(str::to_string))
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to list persisted sessions");
                Vec::new()
            }
        }
    }

    /// Whether the last durable write succeeded.
    pub fn persistence(&self) -> Persistence {
        if self.degraded.load(Ordering::Relaxed) {
            Persistence::MemoryOnly
        } else {
            Persistence::Durable
        }
    }

    fn mutate<F>(&self, trip_id: &str, f: F) -> Option<ConciergeSession>
    where
        F: FnOnce(&mut ConciergeSession),
    {
        let mut sessions = self.sessions.lock();
        let mut next = self.lookup(&mut sessions, trip_id)?;
        f(&mut next);
        self.commit(&mut sessions, next.clone());
        Some(next)
    }

    /// Memory first, then storage (caching what storage returns).
    fn lookup(
        &self,
        sessions: &mut HashMap<String, ConciergeSession>,
        trip_id: &str,
    ) -> Option<ConciergeSession> {
        if let Some(session) = sessions.get(trip_id) {
            return Some(session.clone());
        }
        let session = self.load(trip_id)?;
        sessions.insert(trip_id.to_string(), session.clone());
        Some(session)
    }

    fn load(&self, trip_id: &str) -> Option<ConciergeSession> {
        let key = session_storage_key(trip_id);
        let raw = match self.storage.get(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(trip_id = %trip_id, error = %e, "failed to read persisted session");
                return None;
            }
        };
        match serde_json::from_str::<ConciergeSession>(&raw) {
            Ok(session) if session.trip_id == trip_id => {
                debug!(trip_id = %trip_id, "loaded session from storage");
                Some(session)
            }
            Ok(_) => {
                warn!(trip_id = %trip_id, "persisted session belongs to another trip; ignoring");
                None
            }
            Err(e) => {
                warn!(trip_id = %trip_id, error = %e, "discarding unreadable persisted session");
                None
            }
        }
    }

    fn commit(&self, sessions: &mut HashMap<String, ConciergeSession>, session: ConciergeSession) {
        self.persist(&session);
        let trip_id = session.trip_id.clone();
        sessions.insert(trip_id.clone(), session.clone());
        self.publish(&trip_id, Some(session));
    }

    fn persist(&self, session: &ConciergeSession) {
        let key = session_storage_key(&session.trip_id);
        let result = serde_json::to_string(session)
            .map_err(|e| e.to_string())
            .and_then(|json| self.storage.set(&key, &json).map_err(|e| e.to_string()));
        match result {
            Ok(()) => {
                if self.degraded.swap(false, Ordering::Relaxed) {
                    debug!("session storage recovered");
                }
            }
            Err(e) => {
                if !self.degraded.swap(true, Ordering::Relaxed) {
                    warn!(
                        trip_id = %session.trip_id,
                        error = %e,
                        "session storage unavailable; continuing in memory only"
                    );
                }
            }
        }
    }

    fn publish(&self, trip_id: &str, snapshot: Option<ConciergeSession>) {
        let mut subscribers = self.subscribers.lock();
        if let Some(sender) = subscribers.get(trip_id) {
            if sender.receiver_count() == 0 {
                subscribers.remove(trip_id);
            } else {
                sender.send_replace(snapshot);
            }
        }
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.lock().len())
            .field("persistence", &self.persistence())
            .finish()
    }
}

/// `<unix-millis>-<8 hex chars>`.
fn message_id(timestamp: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", timestamp.timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lessonpod_platform::{ManualClock, MemoryStore, StorageError};

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
        fn remove(&self, _key: &str) -> Result<bool, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
        fn list_keys(&self, _prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
    }

    fn setup() -> (SessionStore, Arc<MemoryStore>, Arc<ManualClock>) {
        let storage = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let store = SessionStore::with_clock(storage.clone(), clock.clone());
        (store, storage, clock)
    }

    #[test]
    fn creates_fresh_session() {
        let (store, storage, clock) = setup();
        let session = store.get_or_create_session("trip1", 5);
        assert_eq!(session.trip_id, "trip1");
        assert_eq!(session.query_count, 0);
        assert_eq!(session.query_limit, 5);
        assert_eq!(session.voice_state, VoiceState::Idle);
        assert!(session.messages.is_empty());
        assert_eq!(session.created_at, clock.now());
        assert!(storage.get("concierge_session_trip1").unwrap().is_some());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let (store, _, clock) = setup();
        let first = store.get_or_create_session("trip1", 5);
        store.increment_query_count("trip1");
        clock.advance(Duration::seconds(30));
        let second = store.get_or_create_session("trip1", 99);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.query_count, 1);
        assert_eq!(second.query_limit, 5);
    }

    #[test]
    fn loads_from_storage_in_new_store() {
        let (store, storage, clock) = setup();
        store.get_or_create_session("trip1", 5);
        store.add_message("trip1", NewMessage::user("hello"));

        let reloaded = SessionStore::with_clock(storage.clone(), clock.clone());
        let session = reloaded.get_session("trip1").unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, "hello");
    }

    #[test]
    fn update_merges_fields() {
        let (store, _, _) = setup();
        let created = store.get_or_create_session("trip1", 5);
        let updated = store
            .update_session(
                "trip1",
                SessionUpdate {
                    query_limit: Some(10),
                    voice_state: Some(VoiceState::Listening),
                    ..SessionUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.query_limit, 10);
        assert_eq!(updated.voice_state, VoiceState::Listening);
        assert_eq!(updated.trip_id, "trip1");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn update_can_clear_error() {
        let (store, _, _) = setup();
        store.get_or_create_session("trip1", 5);
        store.set_last_error("trip1", "boom");
        let cleared = store
            .update_session(
                "trip1",
                SessionUpdate {
                    last_error: Some(None),
                    last_error_at: Some(None),
                    ..SessionUpdate::default()
                },
            )
            .unwrap();
        assert!(cleared.last_error.is_none());
        assert!(cleared.last_error_at.is_none());
        // Clearing the error leaves the voice state alone.
        assert_eq!(cleared.voice_state, VoiceState::Error);
    }

    #[test]
    fn mutations_on_unknown_trip_return_none() {
        let (store, storage, _) = setup();
        assert!(store.update_session("nope", SessionUpdate::default()).is_none());
        assert!(store.add_message("nope", NewMessage::user("hi")).is_none());
        assert!(store.increment_query_count("nope").is_none());
        assert!(store.set_voice_state("nope", VoiceState::Speaking).is_none());
        assert!(store.set_last_error("nope", "x").is_none());
        assert!(!store.can_make_query("nope"));
        assert!(storage.is_empty());
    }

    #[test]
    fn messages_append_in_call_order() {
        let (store, _, clock) = setup();
        store.get_or_create_session("trip1", 5);
        let later = clock.now() + Duration::seconds(10);
        store.add_message("trip1", NewMessage::user("first").at(later));
        store.add_message("trip1", NewMessage::assistant("second"));
        let session = store.add_message("trip1", NewMessage::user("first")).unwrap();

        let contents: Vec<_> = session.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "first"]);
        assert_eq!(session.messages[0].timestamp, later);
        assert_eq!(session.messages[1].timestamp, clock.now());
        assert_eq!(session.messages[1].role, MessageRole::Assistant);

        let ids: std::collections::HashSet<_> = session.messages.iter().map(|m| &m.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(
            session.messages[1]
                .id
                .starts_with(&clock.now().timestamp_millis().to_string())
        );
    }

    #[test]
    fn quota_is_advisory() {
        let (store, _, clock) = setup();
        store.get_or_create_session("trip1", 5);
        for _ in 0..5 {
            assert!(store.can_make_query("trip1"));
            store.increment_query_count("trip1");
        }
        assert!(!store.can_make_query("trip1"));

        let session = store.increment_query_count("trip1").unwrap();
        assert_eq!(session.query_count, 6);
        assert_eq!(session.remaining_queries(), 0);
        assert_eq!(session.last_success_at, Some(clock.now()));
    }

    #[test]
    fn voice_state_accepts_any_transition() {
        let (store, _, _) = setup();
        store.get_or_create_session("trip1", 5);
        for state in [
            VoiceState::Speaking,
            VoiceState::Idle,
            VoiceState::FallbackText,
            VoiceState::Connecting,
            VoiceState::Error,
            VoiceState::Listening,
        ] {
            assert_eq!(store.set_voice_state("trip1", state).unwrap().voice_state, state);
        }
    }

    #[test]
    fn last_error_forces_error_state() {
        let (store, _, clock) = setup();
        store.get_or_create_session("trip1", 5);
        store.set_voice_state("trip1", VoiceState::Speaking);
        let session = store.set_last_error("trip1", "boom").unwrap();
        assert_eq!(session.voice_state, VoiceState::Error);
        assert_eq!(session.last_error.as_deref(), Some("boom"));
        assert_eq!(session.last_error_at, Some(clock.now()));
    }

    #[test]
    fn clear_removes_memory_and_storage() {
        let (store, storage, _) = setup();
        store.get_or_create_session("trip1", 5);
        assert!(store.clear_session("trip1"));
        assert!(store.get_session("trip1").is_none());
        assert!(storage.get("concierge_session_trip1").unwrap().is_none());
        assert!(!store.clear_session("trip1"));

        // A new session after clearing starts fresh.
        let fresh = store.get_or_create_session("trip1", 3);
        assert_eq!(fresh.query_limit, 3);
    }

    #[test]
    fn snapshots_are_independent() {
        let (store, _, _) = setup();
        let before = store.get_or_create_session("trip1", 5);
        store.add_message("trip1", NewMessage::user("hi"));
        assert!(before.messages.is_empty());
    }

    #[test]
    fn stored_trip_ids_lists_sessions() {
        let (store, storage, _) = setup();
        store.get_or_create_session("b", 1);
        store.get_or_create_session("a", 1);
        storage.set("voice_circuit_breaker", "{}").unwrap();
        assert_eq!(store.stored_trip_ids(), vec!["a", "b"]);
    }

    #[test]
    fn storage_failure_degrades_to_memory() {
        let clock = Arc::new(ManualClock::default());
        let store = SessionStore::with_clock(Arc::new(BrokenStore), clock);
        assert_eq!(store.persistence(), Persistence::Durable);

        store.get_or_create_session("trip1", 2);
        assert_eq!(store.persistence(), Persistence::MemoryOnly);

        store.add_message("trip1", NewMessage::user("still works"));
        store.increment_query_count("trip1");
        let session = store.get_session("trip1").unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.query_count, 1);
        assert!(store.clear_session("trip1"));
        assert!(store.stored_trip_ids().is_empty());
    }

    #[test]
    fn unreadable_stored_session_is_ignored() {
        let (store, storage, _) = setup();
        storage.set("concierge_session_trip1", "garbage").unwrap();
        assert!(store.get_session("trip1").is_none());
        let session = store.get_or_create_session("trip1", 4);
        assert_eq!(session.query_limit, 4);
    }

    #[test]
    fn subscription_sees_snapshots() {
        let (store, _, _) = setup();
        let mut rx = store.subscribe("trip1");
        assert!(rx.borrow_and_update().is_none());

        store.get_or_create_session("trip1", 5);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().query_limit, 5);

        store.add_message("trip1", NewMessage::user("hi"));
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().messages.len(), 1);

        // Other trips do not notify.
        store.get_or_create_session("trip2", 5);
        assert!(!rx.has_changed().unwrap());

        store.clear_session("trip1");
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let (store, _, _) = setup();
        let rx = store.subscribe("trip1");
        drop(rx);
        store.get_or_create_session("trip1", 5);
        assert!(store.subscribers.lock().is_empty());
    }

    #[test]
    fn session_json_uses_camel_case() {
        let (store, storage, _) = setup();
        store.get_or_create_session("trip1", 5);
        store.set_voice_state("trip1", VoiceState::FallbackText);
        let raw = storage.get("concierge_session_trip1").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["tripId"], "trip1");
        assert_eq!(json["queryLimit"], 5);
        assert_eq!(json["voiceState"], "fallback_text");
    }
}
