//! Configuration file discovery.
//!
//! The discovery order is:
//! 1. `LESSONPOD_CONFIG` environment variable (path used as-is).
//! 2. `~/.lessonpod/config.toml` if it exists.
//! 3. Otherwise `None`; callers fall back to built-in defaults.

use std::path::PathBuf;

use crate::env::Environment;

/// Environment variable that overrides config discovery.
pub const CONFIG_ENV_VAR: &str = "LESSONPOD_CONFIG";

/// Discover the config file path using the fallback chain.
pub fn discover_config_path(env: &dyn Environment, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(env_path) = env.get_var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(env_path));
    }

    let path = home_dir?.join(".lessonpod").join("config.toml");
    path.exists().then_some(path)
}
