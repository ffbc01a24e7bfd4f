//! Result cache storage
//!
//! Layering:
//! - `CacheStore`: namespaced byte store (in-memory or sled)
//! - `ResultCache`: typed, TTL-aware cache of analysis results on top of it

mod persistence;
mod result_cache;
mod sled_store;

pub use persistence::{CacheStore, InMemoryStore, StoreError};
pub use result_cache::{CacheEntry, CacheHit, CacheStats, ResultCache};
pub use sled_store::SledStore;
