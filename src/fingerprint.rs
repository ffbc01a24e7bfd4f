//! Dataset fingerprints used as result-cache keys
//!
//! A fingerprint is `{mode}:{count}:{md5}` where the digest covers the sorted
//! entity IDs. Sorting makes the key independent of input order; the count
//! term keeps equal-sized subsets with different membership apart even before
//! the digest is compared.
//!
//! The identity policy deliberately ignores an entity's mutable fields, so a
//! status change inside the TTL window is served from cache. The content
//! policy folds each entity's [`Fingerprintable::content_signature`] into the
//! digest and trades hit rate for freshness.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between IDs inside the digest input (ASCII unit separator)
const ID_SEPARATOR: &str = "\u{1f}";

/// An entity that can take part in a fingerprint
pub trait Fingerprintable {
    fn entity_id(&self) -> &str;

    /// Mutable fields that should invalidate a content fingerprint
    fn content_signature(&self) -> String {
        String::new()
    }
}

impl Fingerprintable for String {
    fn entity_id(&self) -> &str {
        self
    }
}

impl Fingerprintable for &str {
    fn entity_id(&self) -> &str {
        self
    }
}

/// Which entity attributes a fingerprint covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintPolicy {
    /// Sorted IDs + count + mode
    #[default]
    Identity,
    /// Identity plus each entity's content signature
    Content,
}

/// Cache key for one (dataset, mode) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild from a stored key (no validation)
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a set of entity IDs under `mode`.
///
/// Duplicate IDs are kept, so the count always equals the input length.
pub fn fingerprint<I, S>(ids: I, mode: &str) -> Fingerprint
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
    sorted.sort_unstable();
    let digest = md5::compute(sorted.join(ID_SEPARATOR).as_bytes());
    Fingerprint(format!("{mode}:{}:{digest:x}", sorted.len()))
}

/// Fingerprint entities by identity and content signature.
pub fn content_fingerprint<T: Fingerprintable>(entities: &[T], mode: &str) -> Fingerprint {
    let mut parts: Vec<(String, String)> = entities
        .iter()
        .map(|e| (e.entity_id().to_string(), e.content_signature()))
        .collect();
    parts.sort_unstable();

    let joined = parts
        .iter()
        .map(|(id, sig)| format!("{id}={sig}"))
        .collect::<Vec<_>>()
        .join(ID_SEPARATOR);
    let digest = md5::compute(joined.as_bytes());
    Fingerprint(format!("{mode}:{}:c{digest:x}", parts.len()))
}

/// Fingerprint entities under the configured policy.
pub fn fingerprint_entities<T: Fingerprintable>(
    entities: &[T],
    mode: &str,
    policy: FingerprintPolicy,
) -> Fingerprint {
    match policy {
        FingerprintPolicy::Identity => fingerprint(entities.iter().map(|e| e.entity_id()), mode),
        FingerprintPolicy::Content => content_fingerprint(entities, mode),
    }
}

/// Short stable digest of any serializable mode parameter (business context, tool list).
pub fn mode_digest<T: Serialize>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let digest = format!("{:x}", md5::compute(&bytes));
    digest[..12].to_string()
}
