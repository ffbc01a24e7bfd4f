//! CacheStore trait: pluggable namespaced key-value backend
//!
//! The result cache only needs a small namespaced byte store, so backends can
//! be swapped without touching the orchestration code:
//! - `InMemoryStore`: process-local store for tests and ephemeral sessions
//! - `SledStore`: on-disk store that survives restarts

use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for pluggable cache backends
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across async tasks. Every write must be atomic per key: a reader sees
/// either the old value or the new one, never a mix.
pub trait CacheStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert or overwrite
    fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Returns whether a value was present
    fn remove(&self, namespace: &str, key: &str) -> Result<bool, StoreError>;

    /// Replace the value only while it still equals `expected`; `None`
    /// removes it. Returns whether the swap happened.
    fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: &[u8],
        new: Option<Vec<u8>>,
    ) -> Result<bool, StoreError>;

    /// All keys in a namespace
    fn keys(&self, namespace: &str) -> Result<Vec<String>, StoreError>;

    /// Remove a whole namespace, or everything when `None`. Returns the number removed.
    fn clear(&self, namespace: Option<&str>) -> Result<usize, StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Cache backend errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("quota exceeded ({capacity} entries)")]
    QuotaExceeded { capacity: usize },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// In-memory store
///
/// Thread-safe via `RwLock`. Not durable; data is lost on restart. An optional
/// capacity makes new keys fail with `QuotaExceeded` once full, mirroring a
/// browser-style storage quota.
pub struct InMemoryStore {
    entries: RwLock<HashMap<(String, String), Vec<u8>>>,
    capacity: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: None,
        }
    }

    /// Store that rejects new keys beyond `capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: Some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for InMemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        let map_key = (namespace.to_string(), key.to_string());
        if let Some(capacity) = self.capacity {
            if !entries.contains_key(&map_key) && entries.len() >= capacity {
                return Err(StoreError::QuotaExceeded { capacity });
            }
        }

        entries.insert(map_key, value);
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<bool, StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(entries
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some())
    }

    fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: &[u8],
        new: Option<Vec<u8>>,
    ) -> Result<bool, StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        let map_key = (namespace.to_string(), key.to_string());
        match entries.get(&map_key) {
            Some(current) if current.as_slice() == expected => {}
            _ => return Ok(false),
        }
        match new {
            Some(value) => entries.insert(map_key, value),
            None => entries.remove(&map_key),
        };
        Ok(true)
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(entries
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, k)| k.clone())
            .collect())
    }

    fn clear(&self, namespace: Option<&str>) -> Result<usize, StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        let before = entries.len();
        match namespace {
            Some(ns) => entries.retain(|(entry_ns, _), _| entry_ns != ns),
            None => entries.clear(),
        }
        Ok(before - entries.len())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
