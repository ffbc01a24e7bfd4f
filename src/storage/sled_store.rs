//! Sled-backed cache store
//!
//! Key format: `{namespace}/{key}`. Fingerprints never contain `/`, so a
//! prefix scan on `{namespace}/` selects exactly one analysis kind.

use sled::Db;
use std::path::Path;
use tracing::debug;

use super::persistence::{CacheStore, StoreError};

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

/// Durable cache store
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create the cache database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Result cache store opened");
        Ok(Self { db })
    }

    /// Open a throwaway database that is deleted on drop
    pub fn open_temp() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn build_key(namespace: &str, key: &str) -> String {
        format!("{namespace}/{key}")
    }

    fn prefix(namespace: &str) -> String {
        format!("{namespace}/")
    }
}

impl CacheStore for SledStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .db
            .get(Self::build_key(namespace, key).as_bytes())?
            .map(|v| v.to_vec()))
    }

    fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.db
            .insert(Self::build_key(namespace, key).as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<bool, StoreError> {
        let removed = self
            .db
            .remove(Self::build_key(namespace, key).as_bytes())?
            .is_some();
        Ok(removed)
    }

    fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: &[u8],
        new: Option<Vec<u8>>,
    ) -> Result<bool, StoreError> {
        let swapped = self
            .db
            .compare_and_swap(Self::build_key(namespace, key).as_bytes(), Some(expected), new)?
            .is_ok();
        if swapped {
            self.db.flush()?;
        }
        Ok(swapped)
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        let prefix = Self::prefix(namespace);
        let mut keys = Vec::new();
        for item in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            if let Ok(key_str) = std::str::from_utf8(&key) {
                keys.push(key_str[prefix.len()..].to_string());
            }
        }
        Ok(keys)
    }

    fn clear(&self, namespace: Option<&str>) -> Result<usize, StoreError> {
        let removed = match namespace {
            Some(ns) => {
                let prefix = Self::prefix(ns);
                let mut doomed = Vec::new();
                for item in self.db.scan_prefix(prefix.as_bytes()) {
                    let (key, _) = item?;
                    doomed.push(key);
                }
                for key in &doomed {
                    self.db.remove(key)?;
                }
                doomed.len()
            }
            None => {
                let count = self.db.len();
                self.db.clear()?;
                count
            }
        };
        self.db.flush()?;
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_retrieve() {
        let store = SledStore::open_temp().unwrap();
        store.put("discovery", "discovery:2:abc", b"payload".to_vec()).unwrap();

        assert_eq!(
            store.get("discovery", "discovery:2:abc").unwrap(),
            Some(b"payload".to_vec())
        );
        assert_eq!(store.get("hypothesis", "discovery:2:abc").unwrap(), None);
    }

    #[test]
    fn test_namespace_isolation_on_clear() {
        let store = SledStore::open_temp().unwrap();
        store.put("discovery", "a", vec![1]).unwrap();
        store.put("discovery", "b", vec![2]).unwrap();
        store.put("agent_forecast", "a", vec![3]).unwrap();

        assert_eq!(store.keys("discovery").unwrap().len(), 2);
        assert_eq!(store.clear(Some("discovery")).unwrap(), 2);
        assert!(store.keys("discovery").unwrap().is_empty());
        assert_eq!(store.keys("agent_forecast").unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(temp_dir.path()).unwrap();
            store.put("discovery", "k", vec![7]).unwrap();
        }
        let store = SledStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.get("discovery", "k").unwrap(), Some(vec![7]));
    }

    #[test]
    fn test_compare_and_swap() {
        let store = SledStore::open_temp().unwrap();
        store.put("discovery", "k", vec![1]).unwrap();

        assert!(!store.compare_and_swap("discovery", "k", &[0], Some(vec![2])).unwrap());
        assert!(store.compare_and_swap("discovery", "k", &[1], Some(vec![2])).unwrap());
        assert_eq!(store.get("discovery", "k").unwrap(), Some(vec![2]));

        store.clear(None).unwrap();
        assert!(!store.compare_and_swap("discovery", "k", &[2], Some(vec![3])).unwrap());
        assert_eq!(store.get("discovery", "k").unwrap(), None);
    }

    #[test]
    fn test_clear_all() {
        let store = SledStore::open_temp().unwrap();
        store.put("a", "1", vec![1]).unwrap();
        store.put("b", "1", vec![1]).unwrap();
        assert_eq!(store.clear(None).unwrap(), 2);
        assert!(!store.remove("a", "1").unwrap());
    }
}
