//! TTL result cache over a [`CacheStore`]
//!
//! Entries are keyed by `(AnalysisKind, Fingerprint)` and stored as JSON
//! `{payload, stored_at, last_served_at, hits}`. The cache is best-effort:
//! any backend or serialization failure is logged and turned into a miss
//! (reads) or a no-op (writes), so callers recompute instead of failing.
//!
//! Reads only write back through compare-and-swap against the bytes they
//! read, so a concurrent `clear` or `put` is never undone by a hit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::persistence::{CacheStore, InMemoryStore, StoreError};
use crate::fingerprint::Fingerprint;
use crate::types::{AnalysisKind, AnalysisResult};

/// Persisted cache record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: AnalysisResult,
    pub stored_at: DateTime<Utc>,
    #[serde(default)]
    pub last_served_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hits: u64,
}

/// A live entry returned by [`ResultCache::get`]
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub payload: AnalysisResult,
    pub stored_at: DateTime<Utc>,
    /// When this read served the entry
    pub served_at: DateTime<Utc>,
    /// Times served, including this read
    pub hits: u64,
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub expired_evictions: u64,
    pub backend_errors: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    expired_evictions: AtomicU64,
    backend_errors: AtomicU64,
}

/// Result cache with TTL-based staleness.
///
/// Construct once per process and share via `Arc`; clear explicitly with
/// [`ResultCache::clear`].
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl: chrono::Duration,
    counters: Counters,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        info!(
            backend = store.backend_name(),
            ttl_secs = ttl.num_seconds(),
            "Result cache ready"
        );
        Self {
            store,
            ttl,
            counters: Counters::default(),
        }
    }

    /// Cache over a fresh in-memory store
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), ttl)
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// An entry is live while `now - stored_at < ttl`
    pub fn is_fresh(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(stored_at) < self.ttl
    }

    pub fn get(&self, kind: AnalysisKind, fingerprint: &Fingerprint) -> Option<CacheHit> {
        self.get_at(kind, fingerprint, Utc::now())
    }

    /// Read with an explicit clock. Expired and unreadable entries are dropped.
    pub fn get_at(
        &self,
        kind: AnalysisKind,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Option<CacheHit> {
        self.get_checked_at(kind, fingerprint, now, |_| Ok::<(), Infallible>(()))
    }

    /// Like [`ResultCache::get`], but a payload that fails `check` is treated
    /// as corrupt: dropped and counted as a miss.
    pub fn get_checked<E, F>(
        &self,
        kind: AnalysisKind,
        fingerprint: &Fingerprint,
        check: F,
    ) -> Option<CacheHit>
    where
        E: Display,
        F: FnOnce(&AnalysisResult) -> Result<(), E>,
    {
        self.get_checked_at(kind, fingerprint, Utc::now(), check)
    }

    pub fn get_checked_at<E, F>(
        &self,
        kind: AnalysisKind,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
        check: F,
    ) -> Option<CacheHit>
    where
        E: Display,
        F: FnOnce(&AnalysisResult) -> Result<(), E>,
    {
        let Some((raw, mut entry)) = self.read_entry(kind, fingerprint) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if !self.is_fresh(entry.stored_at, now) {
            debug!(kind = %kind, key = %fingerprint, stored_at = %entry.stored_at, "Cache entry expired");
            self.counters.expired_evictions.fetch_add(1, Ordering::Relaxed);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            self.discard(kind, fingerprint, &raw);
            return None;
        }

        if entry.payload.kind() != kind {
            warn!(
                kind = %kind,
                stored_kind = %entry.payload.kind(),
                key = %fingerprint,
                "Cache entry holds the wrong kind, dropping"
            );
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            self.discard(kind, fingerprint, &raw);
            return None;
        }

        if let Err(e) = check(&entry.payload) {
            warn!(kind = %kind, key = %fingerprint, error = %e, "Cached payload fails validation, dropping");
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            self.discard(kind, fingerprint, &raw);
            return None;
        }

        entry.last_served_at = Some(now);
        entry.hits += 1;
        if !self.swap_entry(kind, fingerprint, &raw, &entry) {
            // A clear or a newer put landed after the read; that write wins
            debug!(kind = %kind, key = %fingerprint, "Cache entry changed while serving");
        }
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!(kind = %kind, key = %fingerprint, hits = entry.hits, "Cache hit");

        Some(CacheHit {
            payload: entry.payload,
            stored_at: entry.stored_at,
            served_at: now,
            hits: entry.hits,
        })
    }

    /// Raw entry lookup without TTL checks or hit accounting
    pub fn peek(&self, kind: AnalysisKind, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.read_entry(kind, fingerprint).map(|(_, entry)| entry)
    }

    /// Store (or overwrite) a payload with a fresh timestamp
    pub fn put(&self, kind: AnalysisKind, fingerprint: &Fingerprint, payload: &AnalysisResult) {
        self.put_at(kind, fingerprint, payload, Utc::now());
    }

    pub fn put_at(
        &self,
        kind: AnalysisKind,
        fingerprint: &Fingerprint,
        payload: &AnalysisResult,
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry {
            payload: payload.clone(),
            stored_at: now,
            last_served_at: None,
            hits: 0,
        };
        if self.write_entry(kind, fingerprint, &entry) {
            self.counters.writes.fetch_add(1, Ordering::Relaxed);
            debug!(kind = %kind, key = %fingerprint, "Cached analysis result");
        }
    }

    pub fn remove(&self, kind: AnalysisKind, fingerprint: &Fingerprint) -> bool {
        match self.store.remove(kind.as_str(), fingerprint.as_str()) {
            Ok(removed) => removed,
            Err(e) => {
                self.note_backend_error("remove", &e);
                false
            }
        }
    }

    /// Remove one kind, or everything when `None`. Returns entries removed.
    pub fn clear(&self, kind: Option<AnalysisKind>) -> usize {
        let namespace = kind.map(|k| k.as_str());
        match self.store.clear(namespace) {
            Ok(removed) => {
                info!(kind = namespace.unwrap_or("all"), removed, "Result cache cleared");
                removed
            }
            Err(e) => {
                self.note_backend_error("clear", &e);
                0
            }
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Sweep every kind and drop expired or unreadable entries
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for kind in AnalysisKind::ALL {
            let keys = match self.store.keys(kind.as_str()) {
                Ok(keys) => keys,
                Err(e) => {
                    self.note_backend_error("keys", &e);
                    continue;
                }
            };
            for key in keys {
                let fingerprint = Fingerprint::from_raw(key);
                if let Some((raw, entry)) = self.read_entry(kind, &fingerprint) {
                    if !self.is_fresh(entry.stored_at, now) && self.discard(kind, &fingerprint, &raw) {
                        removed += 1;
                    }
                }
            }
        }
        if removed > 0 {
            self.counters
                .expired_evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
            info!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Number of stored entries (live or not) for one kind
    pub fn len(&self, kind: AnalysisKind) -> usize {
        self.store.keys(kind.as_str()).map(|k| k.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            expired_evictions: self.counters.expired_evictions.load(Ordering::Relaxed),
            backend_errors: self.counters.backend_errors.load(Ordering::Relaxed),
        }
    }

    /// Stored bytes plus the decoded entry. Unreadable entries are dropped.
    fn read_entry(
        &self,
        kind: AnalysisKind,
        fingerprint: &Fingerprint,
    ) -> Option<(Vec<u8>, CacheEntry)> {
        let bytes = match self.store.get(kind.as_str(), fingerprint.as_str()) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                self.note_backend_error("get", &e);
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) => Some((bytes, entry)),
            Err(e) => {
                warn!(kind = %kind, key = %fingerprint, error = %e, "Corrupt cache entry, dropping");
                self.discard(kind, fingerprint, &bytes);
                None
            }
        }
    }

    /// Remove the entry only if it still holds `raw`
    fn discard(&self, kind: AnalysisKind, fingerprint: &Fingerprint, raw: &[u8]) -> bool {
        match self
            .store
            .compare_and_swap(kind.as_str(), fingerprint.as_str(), raw, None)
        {
            Ok(removed) => removed,
            Err(e) => {
                self.note_backend_error("compare_and_swap", &e);
                false
            }
        }
    }

    /// Replace the entry only if it still holds `raw`
    fn swap_entry(
        &self,
        kind: AnalysisKind,
        fingerprint: &Fingerprint,
        raw: &[u8],
        entry: &CacheEntry,
    ) -> bool {
        let result = serde_json::to_vec(entry)
            .map_err(StoreError::from)
            .and_then(|bytes| {
                self.store
                    .compare_and_swap(kind.as_str(), fingerprint.as_str(), raw, Some(bytes))
            });

        match result {
            Ok(swapped) => swapped,
            Err(e) => {
                self.note_backend_error("compare_and_swap", &e);
                false
            }
        }
    }

    fn write_entry(&self, kind: AnalysisKind, fingerprint: &Fingerprint, entry: &CacheEntry) -> bool {
        let result = serde_json::to_vec(entry)
            .map_err(StoreError::from)
            .and_then(|bytes| self.store.put(kind.as_str(), fingerprint.as_str(), bytes));

        match result {
            Ok(()) => true,
            Err(e) => {
                self.note_backend_error("put", &e);
                false
            }
        }
    }

    fn note_backend_error(&self, op: &'static str, error: &StoreError) {
        self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
        warn!(
            op,
            backend = self.store.backend_name(),
            error = %error,
            "Result cache unavailable, continuing without it"
        );
    }
}
