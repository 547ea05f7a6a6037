//! Circuit breaker for the voice channel.
//!
//! Counts voice failures inside a time window and trips to text fallback
//! once the threshold is reached. State is written through to durable
//! storage so a reload does not reset an unhealthy connection, and it
//! heals itself after a period of inactivity.
//!
//! # State machine
//!
//! ```text
//! CLOSED ──[failures >= threshold within window]──► TRIPPED
//!    ▲                                                 │
//!    └──────[record_success / reset / trip expiry]─────┘
//! ```
//!
//! A failure recorded after the window has lapsed starts a new window
//! with a count of one.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lessonpod_platform::{Clock, KeyValueStore, SystemClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Storage key for the persisted breaker state.
pub const CIRCUIT_BREAKER_KEY: &str = "voice_circuit_breaker";

const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_WINDOW_SECS: i64 = 5 * 60;
const DEFAULT_EXPIRY_SECS: i64 = 30 * 60;

/// Failure counting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures within one window that trip the breaker.
    pub failure_threshold: u32,
    /// Length of a failure window, measured from its first failure.
    pub window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            window: Duration::seconds(DEFAULT_WINDOW_SECS),
        }
    }
}

/// Snapshot of the breaker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerState {
    pub failures: u32,
    pub first_failure_at: Option<DateTime<Utc>>,
    pub tripped_at: Option<DateTime<Utc>>,
    pub tripped: bool,
}

/// What goes to storage: the state plus when it was written.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredState {
    state: CircuitBreakerState,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    state: CircuitBreakerState,
    /// When `state` last changed in this process.
    written_at: Option<DateTime<Utc>>,
}

/// Time-windowed, persisted circuit breaker.
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: CircuitBreakerConfig,
    expiry: Duration,
}

impl CircuitBreaker {
    /// Create a breaker persisting to `storage`, using the system clock.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    /// Create a breaker with an explicit clock.
    pub fn with_clock(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            storage,
            clock,
            config: CircuitBreakerConfig::default(),
            expiry: Duration::seconds(DEFAULT_EXPIRY_SECS),
        }
    }

    /// Override the config used by [`record_failure`](Self::record_failure).
    pub fn with_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override how long persisted state and trips stay valid (default 30 min).
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    /// The config used by [`record_failure`](Self::record_failure).
    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Record a failure with the breaker's own config.
    pub fn record_failure(&self) -> CircuitBreakerState {
        self.record_failure_with(&self.config)
    }

    /// Record a failure and return the resulting state.
    pub fn record_failure_with(&self, config: &CircuitBreakerConfig) -> CircuitBreakerState {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.merge_stored(&mut inner, now);

        let state = &mut inner.state;
        if let Some(first) = state.first_failure_at {
            if now - first > config.window {
                debug!("failure window lapsed; starting a new one");
                *state = CircuitBreakerState::default();
            }
        }

        state.failures += 1;
        if state.first_failure_at.is_none() {
            state.first_failure_at = Some(now);
        }
        if !state.tripped && state.failures >= config.failure_threshold {
            state.tripped = true;
            state.tripped_at = Some(now);
            info!(
                failures = state.failures,
                threshold = config.failure_threshold,
                "voice circuit breaker tripped; falling back to text"
            );
        }

        let snapshot = state.clone();
        inner.written_at = Some(now);
        self.persist(&snapshot, now);
        snapshot
    }

    /// Record a success: back to the initial closed state.
    pub fn record_success(&self) {
        self.reset();
    }

    /// Clear all counters and the persisted copy.
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.state = CircuitBreakerState::default();
        inner.written_at = Some(now);
        if let Err(e) = self.storage.remove(CIRCUIT_BREAKER_KEY) {
            warn!(error = %e, "failed to clear persisted circuit breaker state");
        }
    }

    /// Whether the breaker is tripped. A trip older than the expiry is
    /// cleared and reported as closed.
    pub fn is_tripped(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.merge_stored(&mut inner, now);

        if !inner.state.tripped {
            return false;
        }
        let stale = inner
            .state
            .tripped_at
            .is_none_or(|at| now - at > self.expiry);
        if stale {
            info!("voice circuit breaker trip expired; closing");
            drop(inner);
            self.reset();
            return false;
        }
        true
    }

    /// Current state, merged with any fresher persisted copy.
    pub fn state(&self) -> CircuitBreakerState {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.merge_stored(&mut inner, now);
        inner.state.clone()
    }

    /// Adopt the persisted state when it is unexpired and at least as
    /// recent as our own last write. Expired copies are discarded.
    fn merge_stored(&self, inner: &mut Inner, now: DateTime<Utc>) {
        let raw = match self.storage.get(CIRCUIT_BREAKER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "failed to read persisted circuit breaker state");
                return;
            }
        };
        let stored: StoredState = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "discarding unreadable circuit breaker state");
                self.discard_stored();
                return;
            }
        };
        if now - stored.saved_at > self.expiry {
            debug!("discarding expired circuit breaker state");
            self.discard_stored();
            return;
        }
        if inner.written_at.is_none_or(|w| stored.saved_at >= w) {
            inner.state = stored.state;
            inner.written_at = Some(stored.saved_at);
        }
    }

    fn persist(&self, state: &CircuitBreakerState, now: DateTime<Utc>) {
        let stored = StoredState {
            state: state.clone(),
            saved_at: now,
        };
        let result = serde_json::to_string(&stored)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                self.storage
                    .set(CIRCUIT_BREAKER_KEY, &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!(error = %e, "failed to persist circuit breaker state; keeping it in memory");
        }
    }

    fn discard_stored(&self) {
        if let Err(e) = self.storage.remove(CIRCUIT_BREAKER_KEY) {
            warn!(error = %e, "failed to remove circuit breaker state");
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.inner.lock().state)
            .field("config", &self.config)
            .field("expiry", &self.expiry)
            .finish()
    }
}
