//! In-process read-model cache
//!
//! Key/value cache with a per-entry time-to-live. Expired entries count as
//! misses and are dropped lazily or by [`ReadModelCache::purge_expired`].
//! Clones share the same entries.
//!
//! Every invalidation bumps an epoch. A reader that loaded a value from the
//! store caches it with [`ReadModelCache::insert_if_current`], which refuses
//! the value when an invalidation happened since the reader took the epoch.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// TTL cache shared between queries and projections
#[derive(Debug)]
pub struct ReadModelCache<K, V> {
    entries: Arc<RwLock<HashMap<K, Entry<V>>>>,
    /// Only changed while holding the `entries` write lock
    epoch: Arc<AtomicU64>,
    default_ttl: Duration,
}

impl<K, V> Clone for ReadModelCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            epoch: Arc::clone(&self.epoch),
            default_ttl: self.default_ttl,
        }
    }
}

impl<K, V> ReadModelCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            epoch: Arc::new(AtomicU64::new(0)),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached value, or `None` on a miss or an expired entry
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.write().insert(key, Entry { value, expires_at });
    }

    /// [`set`](Self::set) with the default TTL
    pub fn insert(&self, key: K, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Current invalidation epoch; take it before reading the backing store
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Insert with the default TTL unless the cache was invalidated after
    /// `epoch` was taken. Returns whether the value was cached.
    pub fn insert_if_current(&self, key: K, value: V, epoch: u64) -> bool {
        let mut entries = self.entries.write();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        let expires_at = Instant::now() + self.default_ttl;
        entries.insert(key, Entry { value, expires_at });
        true
    }

    pub fn invalidate(&self, key: &K) {
        let mut entries = self.entries.write();
        entries.remove(key);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write();
        let dropped = entries.len();
        entries.clear();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(dropped, "Cache cleared");
    }

    /// Load `models` under the keys produced by `key_fn`. Returns the count.
    pub fn warm_up<I, F>(&self, models: I, key_fn: F) -> usize
    where
        I: IntoIterator<Item = V>,
        F: Fn(&V) -> K,
    {
        let expires_at = Instant::now() + self.default_ttl;
        let mut entries = self.entries.write();
        let mut loaded = 0;
        for value in models {
            entries.insert(key_fn(&value), Entry { value, expires_at });
            loaded += 1;
        }
        loaded
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}
