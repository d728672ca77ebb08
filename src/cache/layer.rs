//! Tag-addressable read-through cache.
//!
//! Entries are created on a read-through miss and removed by tag, by path or
//! by the emergency clear. There is no update API: a change always means
//! invalidate then recompute.

use std::collections::BTreeSet;
use std::future::Future;

use metrics::counter;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::{CacheKey, CacheTag};
use super::registry::TagRegistry;
use super::store::{CacheEntry, EntryStore, Lookup};

pub(crate) const METRIC_CACHE_HIT: &str = "folio_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "folio_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "folio_cache_evict_total";
pub(crate) const METRIC_CACHE_TAG_INVALIDATIONS: &str = "folio_cache_tag_invalidations_total";

/// Invalidation surface used by the orchestrator.
pub trait CacheInvalidator: Send + Sync {
    /// Drop every entry carrying any of `tags`. Returns entries removed.
    fn invalidate_tags(&self, tags: &BTreeSet<CacheTag>) -> usize;

    /// Drop the rendered output of every path in `paths`. Returns entries removed.
    fn invalidate_paths(&self, paths: &BTreeSet<String>) -> usize;

    /// Drop everything. Reserved for manual administrative use.
    fn clear_all(&self) -> usize;
}

pub struct CacheLayer<V> {
    config: CacheConfig,
    store: EntryStore<V>,
    registry: TagRegistry,
}

impl<V> CacheLayer<V>
where
    V: Clone + Send + Sync,
{
    pub fn new(config: CacheConfig) -> Self {
        let store = EntryStore::new(&config);
        Self {
            config,
            store,
            registry: TagRegistry::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.config.enabled {
            return None;
        }
        match self.store.get(key) {
            Lookup::Hit(value) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(value)
            }
            Lookup::Expired => {
                self.registry.unregister(key);
                counter!(METRIC_CACHE_MISS, "reason" => "expired").increment(1);
                None
            }
            Lookup::Miss => {
                counter!(METRIC_CACHE_MISS, "reason" => "absent").increment(1);
                None
            }
        }
    }

    /// Store a computed value under `key`, tagged with `tags`.
    pub fn insert(&self, key: CacheKey, value: V, tags: BTreeSet<CacheTag>) {
        if !self.config.enabled {
            return;
        }
        self.registry.register(key.clone(), tags.clone());
        let entry = CacheEntry::new(value, tags, self.config.default_ttl());
        if let Some(evicted) = self.store.put(key, entry) {
            self.registry.unregister(&evicted);
            counter!(METRIC_CACHE_EVICT).increment(1);
            debug!(key = %evicted, "cache entry evicted");
        }
    }

    /// Return the cached value or compute it with `load` and cache the result.
    ///
    /// Loader errors are returned as-is and nothing is cached.
    pub async fn read_through<F, Fut, E>(
        &self,
        key: CacheKey,
        tags: BTreeSet<CacheTag>,
        load: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = load().await?;
        self.insert(key, value.clone(), tags);
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn drop_tag(&self, tag: &CacheTag) -> usize {
        let keys = self.registry.take_tag(tag);
        keys.iter()
            .filter(|key| self.store.remove(key).is_some())
            .count()
    }
}

impl<V> CacheInvalidator for CacheLayer<V>
where
    V: Clone + Send + Sync,
{
    fn invalidate_tags(&self, tags: &BTreeSet<CacheTag>) -> usize {
        let removed: usize = tags.iter().map(|tag| self.drop_tag(tag)).sum();
        counter!(METRIC_CACHE_TAG_INVALIDATIONS).increment(tags.len() as u64);
        debug!(tags = tags.len(), removed, "cache tags invalidated");
        removed
    }

    fn invalidate_paths(&self, paths: &BTreeSet<String>) -> usize {
        let removed: usize = paths
            .iter()
            .map(|path| self.drop_tag(&CacheTag::path(path)))
            .sum();
        debug!(paths = paths.len(), removed, "cache paths invalidated");
        removed
    }

    fn clear_all(&self) -> usize {
        let removed = self.store.clear();
        self.registry.clear();
        warn!(removed, "cache cleared");
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use uuid::Uuid;

    use super::*;

    fn tags(list: &[CacheTag]) -> BTreeSet<CacheTag> {
        list.iter().cloned().collect()
    }

    #[tokio::test]
    async fn read_through_loads_once() {
        let cache = CacheLayer::<String>::new(CacheConfig::default());
        let key = CacheKey::new(["resolve", "/about"]);
        let mut loads = 0;

        for _ in 0..3 {
            let value = cache
                .read_through(key.clone(), tags(&[CacheTag::uri("/about")]), || {
                    loads += 1;
                    async { Ok::<_, Infallible>("about".to_string()) }
                })
                .await
                .unwrap();
            assert_eq!(value, "about");
        }
        assert_eq!(loads, 1);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache = CacheLayer::<u8>::new(CacheConfig::default());
        let key = CacheKey::new(["k"]);

        let err = cache
            .read_through(key.clone(), BTreeSet::new(), || async { Err::<u8, _>("down") })
            .await;
        assert_eq!(err, Err("down"));
        assert!(cache.is_empty());
    }

    #[test]
    fn tag_invalidation_removes_only_tagged_entries() {
        let cache = CacheLayer::<u8>::new(CacheConfig::default());
        let id = Uuid::new_v4();
        cache.insert(
            CacheKey::new(["a"]),
            1,
            tags(&[CacheTag::item("posts", id), CacheTag::path("/news/a")]),
        );
        cache.insert(CacheKey::new(["b"]), 2, tags(&[CacheTag::path("/news/b")]));

        let removed = cache.invalidate_tags(&tags(&[CacheTag::item("posts", id)]));
        assert_eq!(removed, 1);
        assert!(cache.get(&CacheKey::new(["a"])).is_none());
        assert_eq!(cache.get(&CacheKey::new(["b"])), Some(2));

        // second call is a no-op
        assert_eq!(
            cache.invalidate_tags(&tags(&[CacheTag::item("posts", id)])),
            0
        );
    }

    #[test]
    fn path_invalidation_uses_display_form() {
        let cache = CacheLayer::<u8>::new(CacheConfig::default());
        cache.insert(CacheKey::new(["home"]), 1, tags(&[CacheTag::path("")]));

        let paths = ["/".to_string()].into_iter().collect();
        assert_eq!(cache.invalidate_paths(&paths), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = CacheLayer::<u8>::new(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        cache.insert(CacheKey::new(["k"]), 1, BTreeSet::new());
        assert!(cache.get(&CacheKey::new(["k"])).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_all_drops_everything() {
        let cache = CacheLayer::<u8>::new(CacheConfig::default());
        cache.insert(CacheKey::new(["a"]), 1, tags(&[CacheTag::uri_listing()]));
        cache.insert(CacheKey::new(["b"]), 2, BTreeSet::new());

        assert_eq!(cache.clear_all(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.invalidate_tags(&tags(&[CacheTag::uri_listing()])), 0);
    }

    #[test]
    fn records_hit_miss_and_evict_metrics() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let cache = CacheLayer::<u8>::new(CacheConfig {
                entry_limit: 1,
                ..Default::default()
            });
            let key = CacheKey::new(["a"]);
            assert!(cache.get(&key).is_none());
            cache.insert(key.clone(), 1, BTreeSet::new());
            assert_eq!(cache.get(&key), Some(1));
            cache.insert(CacheKey::new(["b"]), 2, BTreeSet::new());
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let total = |name: &str| -> u64 {
            snapshot
                .iter()
                .filter(|(key, _, _, _)| key.key().name() == name)
                .map(|(_, _, _, value)| match value {
                    DebugValue::Counter(count) => *count,
                    _ => 0,
                })
                .sum()
        };
        assert_eq!(total(METRIC_CACHE_HIT), 1);
        assert_eq!(total(METRIC_CACHE_MISS), 1);
        assert_eq!(total(METRIC_CACHE_EVICT), 1);
    }
}
