//! Voice feature flags resolved from the environment.
//!
//! Every accessor re-reads the environment on each call, so runtime config
//! changes and test harnesses take effect immediately. Absent or malformed
//! values never fail; they resolve to the documented defaults.

use std::sync::Arc;

use lessonpod_platform::{Environment, NativeEnvironment};
use serde::Serialize;

/// Enables the real-time voice assistant. Default: off.
pub const VOICE_LIVE_ENABLED: &str = "VOICE_LIVE_ENABLED";
/// Enables diagnostic logging for transport and framing. Default: off.
pub const VOICE_DIAGNOSTICS_ENABLED: &str = "VOICE_DIAGNOSTICS_ENABLED";
/// Restricts the voice channel to WebSocket. Default: on.
pub const VOICE_USE_WEBSOCKET_ONLY: &str = "VOICE_USE_WEBSOCKET_ONLY";

/// Whether a config value counts as "true".
///
/// Only the exact strings `"true"`, `"1"` and `"yes"` do; matching is
/// case-sensitive.
pub fn is_truthy(value: &str) -> bool {
    matches!(value, "true" | "1" | "yes")
}

/// Feature flag resolver over an [`Environment`].
#[derive(Clone)]
pub struct FeatureFlags {
    env: Arc<dyn Environment>,
}

impl FeatureFlags {
    /// Resolve flags from `env`.
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self { env }
    }

    /// Resolve flags from the process environment.
    pub fn from_process_env() -> Self {
        Self::new(Arc::new(NativeEnvironment))
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.env.get_var(name).map(|v| is_truthy(&v))
    }

    /// `VOICE_LIVE_ENABLED`, closed when absent.
    pub fn voice_live_enabled(&self) -> bool {
        self.flag(VOICE_LIVE_ENABLED).unwrap_or(false)
    }

    /// `VOICE_DIAGNOSTICS_ENABLED`, off when absent.
    pub fn voice_diagnostics_enabled(&self) -> bool {
        self.flag(VOICE_DIAGNOSTICS_ENABLED).unwrap_or(false)
    }

    /// `VOICE_USE_WEBSOCKET_ONLY`, on when absent.
    pub fn voice_websocket_only(&self) -> bool {
        self.flag(VOICE_USE_WEBSOCKET_ONLY).unwrap_or(true)
    }

    /// Whether the voice feature may be offered at all.
    ///
    /// Currently just [`voice_live_enabled`](Self::voice_live_enabled); kept
    /// separate so added gating conditions land here, not at call sites.
    pub fn voice_feature_available(&self) -> bool {
        self.voice_live_enabled()
    }

    /// Resolve every flag at once.
    pub fn snapshot(&self) -> FlagSnapshot {
        FlagSnapshot {
            voice_live_enabled: self.voice_live_enabled(),
            voice_diagnostics_enabled: self.voice_diagnostics_enabled(),
            voice_websocket_only: self.voice_websocket_only(),
            voice_feature_available: self.voice_feature_available(),
        }
    }
}

impl std::fmt::Debug for FeatureFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureFlags")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Point-in-time view of all flags, for diagnostics output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagSnapshot {
    pub voice_live_enabled: bool,
    pub voice_diagnostics_enabled: bool,
    pub voice_websocket_only: bool,
    pub voice_feature_available: bool,
}
