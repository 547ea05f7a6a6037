//! Voice layer configuration.
//!
//! Loaded from TOML (`~/.lessonpod/config.toml` or `$LESSONPOD_CONFIG`).
//! Every field has a default, so an empty or missing file is valid.
//!
//! ```toml
//! storage_dir = "/var/lib/lessonpod"
//!
//! [transport]
//! url = "wss://voice.example.com/live"
//! type = "websocket"
//! api_key = "..."
//!
//! [breaker]
//! failure_threshold = 3
//! window_secs = 300
//! expiry_secs = 1800
//!
//! [session]
//! default_query_limit = 20
//! ```

use std::path::{Path, PathBuf};

use chrono::Duration;
use lessonpod_platform::Environment;
use lessonpod_platform::config_loader::discover_config_path;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::breaker::CircuitBreakerConfig;
use crate::error::VoiceError;
use crate::transport::TransportConfig;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Durable storage directory. `None` = `~/.lessonpod/storage`.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub breaker: BreakerSettings,

    #[serde(default)]
    pub session: SessionSettings,
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u32,
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u32,
}

fn default_failure_threshold() -> u32 {
    3
}
fn default_window_secs() -> u32 {
    300
}
fn default_expiry_secs() -> u32 {
    1800
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            window_secs: default_window_secs(),
            expiry_secs: default_expiry_secs(),
        }
    }
}

impl BreakerSettings {
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.max(1),
            window: Duration::seconds(i64::from(self.window_secs)),
        }
    }

    pub fn expiry(&self) -> Duration {
        Duration::seconds(i64::from(self.expiry_secs))
    }
}

/// Session defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Quota given to sessions created without an explicit limit.
    #[serde(default = "default_query_limit")]
    pub default_query_limit: u32,
}

fn default_query_limit() -> u32 {
    20
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_query_limit: default_query_limit(),
        }
    }
}

impl VoiceConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, VoiceError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, VoiceError> {
        let raw = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loaded voice config");
        Self::from_toml_str(&raw)
    }

    /// Load the discovered config file, or defaults when there is none.
    pub fn discover(env: &dyn Environment, home_dir: Option<PathBuf>) -> Result<Self, VoiceError> {
        match discover_config_path(env, home_dir) {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                debug!(path = %path.display(), "config file missing; using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// The storage directory to use.
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(lessonpod_platform::storage::default_storage_dir)
    }
}
