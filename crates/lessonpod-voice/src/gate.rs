//! Voice gate: the single "may voice start now?" decision.
//!
//! [`VoiceGate`] combines the live feature flag with the circuit breaker and
//! owns the only user-facing message of the voice layer: a deduplicated
//! fallback notice with a "try voice again" action. The gate never fails;
//! callers read [`VoiceGate::can_use_voice`] and [`VoiceGate::is_tripped`].

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::breaker::CircuitBreaker;
use crate::flags::FeatureFlags;

/// Id of the fallback notice; reusing it makes repeat notices replace each other.
pub const FALLBACK_NOTICE_ID: &str = "voice-fallback";
/// Fallback notice text.
pub const FALLBACK_NOTICE_MESSAGE: &str = "Voice is temporarily unavailable\u{2014}switched to text.";
/// Label of the retry action.
pub const TRY_AGAIN_LABEL: &str = "Try voice again";
/// How long the notice stays up, in milliseconds.
pub const FALLBACK_NOTICE_DURATION_MS: u64 = 8_000;

/// Button attached to a [`Notice`].
#[derive(Clone)]
pub struct NoticeAction {
    pub label: String,
    on_click: Arc<dyn Fn() + Send + Sync>,
}

impl NoticeAction {
    pub fn new(label: impl Into<String>, on_click: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            label: label.into(),
            on_click: Arc::new(on_click),
        }
    }

    /// Run the bound action.
    pub fn click(&self) {
        (self.on_click)();
    }
}

impl fmt::Debug for NoticeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoticeAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A dismissible user-facing notice.
#[derive(Debug, Clone)]
pub struct Notice {
    /// Notices sharing an id replace each other.
    pub id: String,
    pub message: String,
    pub duration_ms: u64,
    pub action: Option<NoticeAction>,
}

/// UI notification channel (toasts).
pub trait Notifier: Send + Sync {
    /// Show `notice`, replacing any visible notice with the same id.
    fn show(&self, notice: Notice);

    /// Dismiss the notice with `id`, if visible.
    fn dismiss(&self, id: &str);
}

/// Notifier that only logs. Used where no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, notice: Notice) {
        info!(id = %notice.id, message = %notice.message, "notice shown");
    }

    fn dismiss(&self, id: &str) {
        debug!(id = %id, "notice dismissed");
    }
}

struct GateInner {
    flags: FeatureFlags,
    breaker: Arc<CircuitBreaker>,
    notifier: Arc<dyn Notifier>,
    /// Last trip state the gate acted on.
    tripped: Mutex<bool>,
}

/// Feature flag + circuit breaker gate for voice capture.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct VoiceGate {
    inner: Arc<GateInner>,
}

impl VoiceGate {
    /// Build a gate and sync it with the breaker's current state, showing
    /// the fallback notice if the breaker is already tripped.
    pub fn new(
        flags: FeatureFlags,
        breaker: Arc<CircuitBreaker>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let gate = Self {
            inner: Arc::new(GateInner {
                flags,
                breaker,
                notifier,
                tripped: Mutex::new(false),
            }),
        };
        gate.refresh();
        gate
    }

    /// Live flag on and breaker closed. Reads the breaker each call.
    pub fn can_use_voice(&self) -> bool {
        self.inner.flags.voice_live_enabled() && !self.refresh()
    }

    /// Whether voice is currently in text fallback. Reads the breaker each
    /// call, so trips recorded elsewhere and expired trips are seen here.
    pub fn is_tripped(&self) -> bool {
        self.refresh()
    }

    /// Re-read the breaker. A transition from closed to tripped shows the
    /// fallback notice; an expired trip clears the tripped state.
    pub fn refresh(&self) -> bool {
        let now_tripped = self.inner.breaker.is_tripped();
        self.transition(now_tripped);
        now_tripped
    }

    /// Report a voice failure. Shows the notice right away if this call
    /// tripped the breaker.
    pub fn record_voice_failure(&self) {
        let state = self.inner.breaker.record_failure();
        self.transition(state.tripped);
    }

    /// Report a voice success, closing the breaker and dismissing the
    /// fallback notice.
    pub fn record_voice_success(&self) {
        self.inner.breaker.record_success();
        *self.inner.tripped.lock() = false;
        self.inner.notifier.dismiss(FALLBACK_NOTICE_ID);
    }

    /// Reset the breaker and dismiss the fallback notice.
    pub fn try_voice_again(&self) {
        info!("retrying voice after fallback");
        self.inner.breaker.reset();
        *self.inner.tripped.lock() = false;
        self.inner.notifier.dismiss(FALLBACK_NOTICE_ID);
    }

    fn transition(&self, now_tripped: bool) {
        let newly_tripped = {
            let mut tripped = self.inner.tripped.lock();
            let newly = now_tripped && !*tripped;
            *tripped = now_tripped;
            newly
        };
        if newly_tripped {
            self.show_fallback_notice();
        }
    }

    fn show_fallback_notice(&self) {
        let weak: Weak<GateInner> = Arc::downgrade(&self.inner);
        let action = NoticeAction::new(TRY_AGAIN_LABEL, move || {
            if let Some(inner) = weak.upgrade() {
                VoiceGate { inner }.try_voice_again();
            }
        });
        self.inner.notifier.show(Notice {
            id: FALLBACK_NOTICE_ID.to_string(),
            message: FALLBACK_NOTICE_MESSAGE.to_string(),
            duration_ms: FALLBACK_NOTICE_DURATION_MS,
            action: Some(action),
        });
    }
}

impl fmt::Debug for VoiceGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceGate")
            .field("live", &self.inner.flags.voice_live_enabled())
            .field("tripped", &*self.inner.tripped.lock())
            .finish()
    }
}
