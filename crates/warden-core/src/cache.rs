//! Result cache used by mechanisms.
//!
//! Entries are immutable once written; a `set` replaces the whole entry.
//! An entry past its expiry is treated as absent. A zero TTL means
//! "do not cache".

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Key → bytes store with per-entry TTL.
pub trait Cache: Send + Sync + fmt::Debug {
    /// Look up a live entry.
    fn get(&self, key: &str) -> Option<Arc<[u8]>>;

    /// Store `value` for `ttl`. A zero `ttl` is a no-op.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);

    /// Remove an entry.
    fn delete(&self, key: &str);
}

/// Derive an opaque cache key from request-relevant parts.
///
/// Parts are length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn fingerprint<I, T>(parts: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        let part = part.as_ref();
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().to_hex().to_string()
}

struct Entry {
    value: Arc<[u8]>,
    // None when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process cache safe for concurrent use from many request tasks.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.is_live(now));
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        // The shard guard must be released before removing.
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .map(|e| (e.value.clone(), e.is_live(now)));

        match hit {
            Some((value, true)) => Some(value),
            Some((_, false)) => {
                self.entries.remove_if(key, |_, e| !e.is_live(now));
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.into(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Cache that never stores anything. Used when caching is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> Option<Arc<[u8]>> {
        None
    }

    fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) {}

    fn delete(&self, _key: &str) {}
}
