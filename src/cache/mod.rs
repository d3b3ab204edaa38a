//! Namespaced, TTL-classified payload cache.
//!
//! The cache only ever improves latency and availability. Every storage
//! failure is swallowed here and looks like a miss to the caller, so an
//! empty or broken cache changes what happens on fetch errors, never the
//! answer of a successful fetch.

mod store;
#[cfg(test)]
mod tests;

pub use store::{CacheStore, FileStore, MemoryStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::utils::from_epoch_millis;

/// Entries older than this many TTL periods are dropped by maintenance and
/// by the eviction pass that runs when the store is full.
pub const EVICTION_TTL_MULTIPLIER: u32 = 6;

/// Source of the current time, replaceable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// On-disk shape of one entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    data: Value,
    /// Unix milliseconds
    timestamp: i64,
}

/// A cache hit, classified against the cache TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPayload {
    pub payload: Value,
    pub written_at: DateTime<Utc>,
    pub age: Duration,
    pub is_stale: bool,
}

/// Key to payload store with staleness classification and eviction.
pub struct PersistentCache<S: CacheStore> {
    store: S,
    namespace: String,
    ttl: Duration,
    clock: Clock,
}

impl<S: CacheStore> PersistentCache<S> {
    pub fn new(store: S, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            ttl,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used for timestamps and ages.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn age_of(&self, written_at: DateTime<Utc>) -> Duration {
        // Entries from the future (clock skew) count as brand new
        ((self.clock)() - written_at).to_std().unwrap_or(Duration::ZERO)
    }

    fn read_entry(&self, storage_key: &str) -> Result<Option<StoredEntry>, StorageError> {
        match self.store.read(storage_key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Look up `key`. Read and parse failures are reported as a miss.
    pub fn get(&self, key: &str) -> Option<CachedPayload> {
        let entry = match self.read_entry(&self.storage_key(key)) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                debug!(key, error = %e, "unreadable cache entry treated as miss");
                return None;
            }
        };
        let written_at = from_epoch_millis(entry.timestamp)?;
        let age = self.age_of(written_at);
        Some(CachedPayload {
            payload: entry.data,
            written_at,
            age,
            is_stale: age > self.ttl,
        })
    }

    /// Write `payload` stamped with the current time.
    ///
    /// When the store is full, entries older than six TTL periods are evicted
    /// and the write is retried once. A second failure is dropped.
    pub fn set(&mut self, key: &str, payload: &Value) {
        match self.try_set(key, payload) {
            Ok(()) => {}
            Err(e) if e.is_full() => {
                let evicted = self.evict_older_than(self.ttl * EVICTION_TTL_MULTIPLIER);
                debug!(key, evicted, "cache full, evicted old entries before retry");
                if let Err(e) = self.try_set(key, payload) {
                    warn!(key, error = %e, "cache write dropped after eviction");
                }
            }
            Err(e) => warn!(key, error = %e, "cache write dropped"),
        }
    }

    /// Single write attempt, surfacing the storage error.
    pub fn try_set(&mut self, key: &str, payload: &Value) -> Result<(), StorageError> {
        let entry = StoredEntry {
            data: payload.clone(),
            timestamp: (self.clock)().timestamp_millis(),
        };
        let raw = serde_json::to_string(&entry)?;
        self.store.write(&self.storage_key(key), &raw)
    }

    fn namespaced_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.namespace))
                .collect(),
            Err(e) => {
                warn!(error = %e, "could not list cache keys");
                Vec::new()
            }
        }
    }

    /// Remove every entry older than `max_age`, plus entries that no longer
    /// parse. Returns how many entries were removed.
    pub fn evict_older_than(&mut self, max_age: Duration) -> usize {
        let mut removed = 0;
        for storage_key in self.namespaced_keys() {
            let expired = match self.read_entry(&storage_key) {
                Ok(Some(entry)) => match from_epoch_millis(entry.timestamp) {
                    Some(written_at) => self.age_of(written_at) > max_age,
                    None => true,
                },
                Ok(None) => false,
                Err(_) => true,
            };
            if expired && self.store.remove(&storage_key).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// Maintenance pass: drop entries older than six TTL periods.
    pub fn prune(&mut self) -> usize {
        self.evict_older_than(self.ttl * EVICTION_TTL_MULTIPLIER)
    }

    /// Remove every entry under this cache's namespace.
    pub fn clear(&mut self) -> usize {
        let mut removed = 0;
        for storage_key in self.namespaced_keys() {
            if self.store.remove(&storage_key).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// Number of entries under this cache's namespace.
    pub fn len(&self) -> usize {
        self.namespaced_keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
