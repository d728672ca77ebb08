//! LRU storage for tagged cache entries.

use std::collections::BTreeSet;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;

use super::config::CacheConfig;
use super::keys::{CacheKey, CacheTag};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// One computed value together with the tags it depends on.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub tags: BTreeSet<CacheTag>,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, tags: BTreeSet<CacheTag>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            tags,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Outcome of a lookup, distinguishing expiry from absence.
#[derive(Debug)]
pub enum Lookup<V> {
    Hit(V),
    Expired,
    Miss,
}

/// Bounded entry storage. Entries are never updated in place; a write
/// replaces the whole entry.
pub struct EntryStore<V> {
    entries: RwLock<LruCache<CacheKey, CacheEntry<V>>>,
}

impl<V: Clone> EntryStore<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.entry_limit_non_zero())),
        }
    }

    /// Look up `key`, dropping the entry when its TTL has passed.
    pub fn get(&self, key: &CacheKey) -> Lookup<V> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            None => return Lookup::Miss,
            Some(entry) if !entry.is_expired(Instant::now()) => {
                return Lookup::Hit(entry.value.clone());
            }
            Some(_) => {}
        }
        entries.pop(key);
        Lookup::Expired
    }

    /// Store an entry, returning the key evicted to make room, if any.
    pub fn put(&self, key: CacheKey, entry: CacheEntry<V>) -> Option<CacheKey> {
        rw_write(&self.entries, SOURCE, "put")
            .push(key.clone(), entry)
            .and_then(|(evicted, _)| (evicted != key).then_some(evicted))
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        rw_write(&self.entries, SOURCE, "remove").pop(key)
    }

    pub fn clear(&self) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
