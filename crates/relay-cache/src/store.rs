//! TTL store.
//!
//! Entries are stamped with [`tokio::time::Instant`], so tests can drive
//! expiry with a paused clock. A stale entry is never returned: `get` drops it
//! on sight, and [`TtlCache::sweep`] removes whatever is left.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::key::CacheKey;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

/// Counters for the lifetime of the cache (or since the last [`TtlCache::clear`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// In-memory map from key to value with a per-entry time-to-live.
///
/// Safe for concurrent use. Two concurrent misses on the same key may both
/// compute; the later `put` wins.
#[derive(Debug)]
pub struct TtlCache<V, K = CacheKey> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V, K> TtlCache<V, K>
where
    V: Clone,
    K: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.read();
            match entries.get(key) {
                Some(entry) if entry.is_fresh(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(_) => {}
            }
        }

        // Stale: drop it unless someone refreshed it in between.
        let mut entries = self.write();
        if entries.get(key).is_some_and(|entry| !entry.is_fresh(now)) {
            entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store `value` under `key`. `None` uses the cache's default TTL.
    /// A zero TTL stores nothing.
    pub fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return;
        }
        self.write().insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove `key`. Returns whether an entry (fresh or stale) was present.
    pub fn invalidate(&self, key: &K) -> bool {
        self.write().remove(key).is_some()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Drop all entries and reset the hit/miss counters.
    pub fn clear(&self) {
        self.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of stored entries, including stale ones not yet swept.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Return the cached value for `key`, or compute it with `f`, store it
    /// for `ttl` (default TTL if `None`), and return it.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` fails with. Failures are never cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: K,
        ttl: Option<Duration>,
        f: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = f().await?;
        self.put(key, value.clone(), ttl);
        Ok(value)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
