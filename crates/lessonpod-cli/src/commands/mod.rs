//! CLI command implementations for `lessonpod`.
//!
//! - [`flags`] -- Resolved feature flags.
//! - [`audio`] -- Audio contract validation.
//! - [`breaker`] -- Circuit breaker status and control.
//! - [`session`] -- Stored concierge sessions.
//! - [`probe`] -- Live endpoint check.

pub mod audio;
pub mod breaker;
pub mod flags;
pub mod probe;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use lessonpod_platform::{FileStore, NativeEnvironment, SystemClock};
use lessonpod_voice::{LogNotifier, VoiceConfig, VoiceServices};
use tracing::debug;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub storage_dir: Option<PathBuf>,
}

/// Load configuration from the given path override or via auto-discovery.
///
/// An explicit path must exist. Discovery falls back to defaults when no
/// file is found.
pub fn load_config(opts: &GlobalOpts) -> anyhow::Result<VoiceConfig> {
    let mut config = match &opts.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            VoiceConfig::load(path)?
        }
        None => VoiceConfig::discover(&NativeEnvironment, dirs::home_dir())?,
    };
    if let Some(dir) = &opts.storage_dir {
        config.storage_dir = Some(dir.clone());
    }
    Ok(config)
}

/// Wire the voice layer over the file store and the process environment.
pub fn build_services(opts: &GlobalOpts) -> anyhow::Result<VoiceServices> {
    let config = load_config(opts)?;
    let storage_dir = config.storage_dir();
    debug!(storage_dir = %storage_dir.display(), "using file storage");
    Ok(VoiceServices::new(
        config,
        Arc::new(NativeEnvironment),
        Arc::new(FileStore::with_dir(storage_dir)),
        Arc::new(SystemClock),
        Arc::new(LogNotifier),
    ))
}

/// Format a timestamp for terminal output.
pub fn format_datetime(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
