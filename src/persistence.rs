//! Durable key-value storage for engine state.
//!
//! Implementations:
//! - [`MemoryStore`]: in-process map, used by tests and when no directory is
//!   configured
//! - [`FileStore`]: one JSON file per key inside a directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Errors raised by a [`StateStore`].
#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid key {0:?}")]
    InvalidKey(String),

    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

/// Keyed string storage.
pub trait StateStore: Send + Sync {
    /// Stored value for `key`, `None` if nothing was written yet.
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a directory of `<key>.json` files.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            && !key.starts_with('.');
        if !valid {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl StateStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        // Write-then-rename so a crash never leaves a truncated record
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|source| PersistenceError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| PersistenceError::Io { path, source })
    }
}

/// A store whose writes always fail.
#[cfg(test)]
pub struct FailingStore;

#[cfg(test)]
impl StateStore for FailingStore {
    fn read(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
        Err(PersistenceError::Unavailable("offline".into()))
    }

    fn write(&self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
        Err(PersistenceError::Unavailable("offline".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("kessler-{name}-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.read("k").unwrap(), None);

        store.write("k", "v1").unwrap();
        store.write("k", "v2").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = scratch_dir("roundtrip");
        let store = FileStore::new(&dir);

        assert_eq!(store.read("kessler.conjunctions").unwrap(), None);
        store.write("kessler.conjunctions", "{\"a\":1}").unwrap();
        assert_eq!(
            store.read("kessler.conjunctions").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert!(dir.join("kessler.conjunctions.json").exists());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let store = FileStore::new(scratch_dir("keys"));
        assert!(matches!(
            store.write("../escape", "x"),
            Err(PersistenceError::InvalidKey(_))
        ));
        assert!(matches!(store.read(""), Err(PersistenceError::InvalidKey(_))));
    }
}
