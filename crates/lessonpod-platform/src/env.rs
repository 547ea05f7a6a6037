//! Environment variable abstraction and native implementation.
//!
//! Provides a platform-agnostic [`Environment`] trait for reading and writing
//! environment variables. The native implementation delegates to [`std::env`];
//! [`MapEnvironment`] keeps variables in memory so tests and embedders can
//! flip configuration without touching the process environment.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Platform-agnostic environment variable access.
///
/// Values are read on every call. Implementations must not cache, so a
/// change made through [`set_var`](Environment::set_var) is visible to the
/// very next [`get_var`](Environment::get_var).
pub trait Environment: Send + Sync {
    /// Get the value of an environment variable, or `None` if it is not set.
    fn get_var(&self, name: &str) -> Option<String>;

    /// Set an environment variable.
    fn set_var(&self, name: &str, value: &str);

    /// Remove (unset) an environment variable.
    fn remove_var(&self, name: &str);
}

/// Native environment implementation using [`std::env`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEnvironment;

impl Environment for NativeEnvironment {
    fn get_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn set_var(&self, name: &str, value: &str) {
        // SAFETY: environment mutation happens during initialization only;
        // we accept the caveats around concurrent mutation.
        unsafe {
            std::env::set_var(name, value);
        }
    }

    fn remove_var(&self, name: &str) {
        // SAFETY: Same caveat as set_var above.
        unsafe {
            std::env::remove_var(name);
        }
    }
}

/// In-memory environment backed by a map.
#[derive(Debug, Default)]
pub struct MapEnvironment {
    vars: RwLock<HashMap<String, String>>,
}

impl MapEnvironment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment pre-populated with `pairs`.
    pub fn with_vars<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            vars: RwLock::new(vars),
        }
    }
}

impl Environment for MapEnvironment {
    fn get_var(&self, name: &str) -> Option<String> {
        self.vars.read().get(name).cloned()
    }

    fn set_var(&self, name: &str, value: &str) {
        self.vars.write().insert(name.to_string(), value.to_string());
    }

    fn remove_var(&self, name: &str) {
        self.vars.write().remove(name);
    }
}
