//! Voice layer bootstrap and dependency wiring.
//!
//! Provides [`VoiceServices`], a convenience struct that builds one instance
//! of each voice component from a [`VoiceConfig`] and the platform seams.
//! Binaries construct it once at startup and hand out clones of the parts.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lessonpod_platform::{FileStore, NativeEnvironment, SystemClock};
//! use lessonpod_voice::{LogNotifier, VoiceConfig, VoiceServices};
//!
//! let config = VoiceConfig::default();
//! let storage = Arc::new(FileStore::with_dir(config.storage_dir()));
//! let services = VoiceServices::new(
//!     config,
//!     Arc::new(NativeEnvironment),
//!     storage,
//!     Arc::new(SystemClock),
//!     Arc::new(LogNotifier),
//! );
//! if services.gate().can_use_voice() {
//!     let transport = services.create_transport()?;
//! }
//! ```

use std::sync::Arc;

use lessonpod_platform::{Clock, Environment, KeyValueStore};
use tracing::debug;

use crate::breaker::CircuitBreaker;
use crate::config::VoiceConfig;
use crate::context::{SessionContext, SessionHandle};
use crate::error::VoiceError;
use crate::flags::FeatureFlags;
use crate::gate::{Notifier, VoiceGate};
use crate::session::SessionStore;
use crate::transport::{VoiceTransport, create_transport};

/// Fully wired voice layer.
pub struct VoiceServices {
    config: VoiceConfig,
    flags: FeatureFlags,
    breaker: Arc<CircuitBreaker>,
    sessions: SessionContext,
    gate: VoiceGate,
}

impl VoiceServices {
    /// Wire every component. Persisted breaker state is merged immediately,
    /// so a trip left by a previous process shows the fallback notice here.
    pub fn new(
        config: VoiceConfig,
        env: Arc<dyn Environment>,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let flags = FeatureFlags::new(env);

        let breaker = Arc::new(
            CircuitBreaker::with_clock(storage.clone(), clock.clone())
                .with_config(config.breaker.breaker_config())
                .with_expiry(config.breaker.expiry()),
        );
        debug!(
            failure_threshold = config.breaker.failure_threshold,
            window_secs = config.breaker.window_secs,
            "circuit breaker initialized"
        );

        let sessions = SessionContext::new(Arc::new(SessionStore::with_clock(storage, clock)));
        let gate = VoiceGate::new(flags.clone(), breaker.clone(), notifier);
        debug!(tripped = gate.is_tripped(), "voice gate initialized");

        Self {
            config,
            flags,
            breaker,
            sessions,
            gate,
        }
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn sessions(&self) -> &SessionContext {
        &self.sessions
    }

    pub fn gate(&self) -> &VoiceGate {
        &self.gate
    }

    /// Bind a session handle using the configured default query limit.
    pub fn session(&self, trip_id: impl Into<String>) -> SessionHandle {
        self.sessions
            .session(trip_id, self.config.session.default_query_limit)
    }

    /// Build a transport for the configured endpoint.
    pub fn create_transport(&self) -> Result<Box<dyn VoiceTransport>, VoiceError> {
        create_transport(self.config.transport.clone(), &self.flags)
    }
}
