//! Key-value persistence for state that must survive restarts.
//!
//! Stores data in XDG directories by default:
//! - Linux: ~/.local/share/tavern/<key>.json
//! - macOS: ~/Library/Application Support/tavern/<key>.json
//! - Windows: %APPDATA%\tavern\<key>.json

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("No data directory found")]
    NoDataDir,
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// A string store addressed by namespace keys.
pub trait KeyValueStore: Send + Sync {
    /// Load the value stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
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

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        // Replace atomically.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Process-local store, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Resolve the data directory: `TAVERN_DATA_DIR`, else the platform default.
pub fn default_data_dir() -> Result<PathBuf, StorageError> {
    if let Ok(override_dir) = std::env::var("TAVERN_DATA_DIR")
        && !override_dir.trim().is_empty()
    {
        return Ok(PathBuf::from(override_dir));
    }

    Ok(dirs::data_dir()
        .ok_or(StorageError::NoDataDir)?
        .join("tavern"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.load("custom-prompts-storage").unwrap(), None);
        store.save("custom-prompts-storage", "{\"a\":1}").unwrap();
        assert_eq!(
            store.load("custom-prompts-storage").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert!(dir.path().join("nested/custom-prompts-storage.json").exists());
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.save("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(store.load(""), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        store.save("k", "one").unwrap();
        store.save("k", "two").unwrap();
        assert_eq!(store.load("k").unwrap().as_deref(), Some("two"));
        assert_eq!(store.load("missing").unwrap(), None);
    }
}
