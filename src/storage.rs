//! Key-value storage backends.
//!
//! Two areas are used: a synced area holding user settings, and a local
//! (non-synced) area holding per-window image handoffs. Both are plain
//! JSON values behind the same trait.

use crate::error::{lock, CaptureError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CaptureError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), CaptureError>;
    async fn remove(&self, key: &str) -> Result<(), CaptureError>;
}

/// In-memory store. Used for the local handoff area and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.entries).contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CaptureError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), CaptureError> {
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CaptureError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// JSON file store: one object file, keys at the top level.
///
/// Default location: `~/.config/pagesnap/<name>.json`.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Store under the platform config directory.
    pub fn in_config_dir(name: &str) -> Self {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pagesnap");
        Self::at(dir.join(format!("{}.json", name)))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Missing or unreadable files read as empty.
    fn load(&self) -> Map<String, Value> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!(
                    "[STORAGE] Ignoring malformed store {}: {}",
                    self.path.display(),
                    e
                );
                Map::new()
            }),
            Err(_) => Map::new(),
        }
    }

    fn save(&self, entries: &Map<String, Value>) -> Result<(), CaptureError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CaptureError::Storage(format!("Failed to create store dir: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| CaptureError::Storage(format!("Failed to serialize store: {}", e)))?;
        std::fs::write(&self.path, json).map_err(|e| {
            CaptureError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CaptureError> {
        let _g = lock(&self.guard);
        Ok(self.load().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), CaptureError> {
        let _g = lock(&self.guard);
        let mut entries = self.load();
        entries.insert(key.to_string(), value);
        self.save(&entries)
    }

    async fn remove(&self, key: &str) -> Result<(), CaptureError> {
        let _g = lock(&self.guard);
        let mut entries = self.load();
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", json!(1)).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!(1)));
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sync.json");

        let store = JsonFileStore::at(&path);
        store.set("settings", json!({"theme": "dark"})).await.unwrap();

        let reopened = JsonFileStore::at(&path);
        assert_eq!(
            reopened.get("settings").await.unwrap(),
            Some(json!({"theme": "dark"}))
        );
    }

    #[tokio::test]
    async fn file_store_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::at(dir.path().join("absent.json"));
        assert_eq!(store.get("settings").await.unwrap(), None);
        store.remove("settings").await.unwrap();
    }

    #[tokio::test]
    async fn file_store_malformed_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::at(&path);
        assert_eq!(store.get("x").await.unwrap(), None);
    }
}
