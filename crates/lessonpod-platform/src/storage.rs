//! Durable local key-value storage.
//!
//! [`KeyValueStore`] is the contract the circuit breaker and the session
//! store persist through: string keys, JSON string values, and operations
//! that may fail. Callers treat storage as a cache/backup and tolerate
//! every failure.
//!
//! Two implementations ship here:
//! - [`MemoryStore`]: a process-local map, used by tests and as the
//!   storage of last resort.
//! - [`FileStore`]: one file per key under a base directory
//!   (`~/.lessonpod/storage/` by default). Writes go to a temp file first
//!   and are renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, percent_encode};
use thiserror::Error;
use tracing::debug;

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error while reading or writing the backing medium.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store cannot be used at all (quota exceeded, disabled, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store with string keys and string values.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key. Returns `None` if not found.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Set a value for a key, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Returns `true` if the key existed.
    fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// List all keys with an optional prefix filter, sorted.
    fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read();
        Ok(entries
            .keys()
            .filter(|k| prefix.is_none_or(|p| k.starts_with(p)))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

const FILE_EXTENSION: &str = "json";

/// Default storage directory: `~/.lessonpod/storage`.
#[cfg(feature = "native")]
pub fn default_storage_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lessonpod")
        .join("storage")
}

/// File-backed [`KeyValueStore`]: one percent-encoded file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

#[cfg(feature = "native")]
impl Default for FileStore {
    fn default() -> Self {
        Self {
            base_dir: default_storage_dir(),
        }
    }
}

impl FileStore {
    /// Create a store rooted at the default directory.
    #[cfg(feature = "native")]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store rooted at `dir` (created lazily on first write).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: dir.into(),
        }
    }

    /// The directory files are written to.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let encoded = percent_encode(key.as_bytes(), NON_ALPHANUMERIC).to_string();
        self.base_dir.join(format!("{encoded}.{FILE_EXTENSION}"))
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir)?;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_dir()?;
        let path = self.key_path(key);
        let tmp_path = path.with_extension(format!("{FILE_EXTENSION}.tmp"));
        fs::write(&tmp_path, value)?;
        fs::rename(&tmp_path, &path)?;
        debug!(key = %key, path = %path.display(), "stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key = %key, "removed value");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_keys(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let key = percent_decode_str(stem).decode_utf8_lossy().into_owned();
            if prefix.is_none_or(|p| key.starts_with(p)) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
