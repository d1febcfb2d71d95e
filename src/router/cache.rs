//! Path split-cache and lookup result cache.
//!
//! Both caches use the same eviction policy: when size exceeds configured
//! capacity, evict approximately half the entries in one sweep, rather
//! than a per-entry LRU. Both cache negative results (misses) as well as
//! positive ones.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::node::RouteRecord;
use super::pool::ParamsMap;

/// A cached `{record, params, path}` match result, minus the
/// handler/middleware (carried separately as the `Arc<RouteRecord>`) so a
/// cached entry is cheap to clone.
#[derive(Clone)]
pub struct CachedMatch {
    pub record: Arc<RouteRecord>,
    pub params: ParamsMap,
}

/// Memoizes [`super::node::Node::parse_template`]-style splitting of request
/// paths (not registration templates) for repeatedly seen paths. Bounded at
/// ~1,024 entries ; eviction clears half when full.
pub struct SplitCache {
    inner: RwLock<HashMap<String, Vec<String>>>,
    capacity: usize,
}

impl SplitCache {
    pub fn new(capacity: usize) -> Self {
        Self { inner: RwLock::new(HashMap::new()), capacity }
    }

    /// Splits `path` on `/`, skipping empty pieces, memoizing the result.
    pub fn split(&self, path: &str) -> Vec<String> {
        if let Some(hit) = self.inner.read().get(path) {
            return hit.clone();
        }

        let segments: Vec<String> = path.split('/').filter(|s| !s.is_empty()).map(str::to_owned).collect();

        let mut guard = self.inner.write();
        if guard.len() >= self.capacity {
            evict_half(&mut guard);
        }
        guard.insert(path.to_string(), segments.clone());
        segments
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

/// Bounded cache from `"{method}:{path}"` to a match result (or a cached
/// miss). "Result cache": default capacity ~1,000, tracks hit/miss
/// counters for [`super::Router::stats`].
pub struct ResultCache {
    inner: RwLock<HashMap<String, Option<CachedMatch>>>,
    capacity: usize,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            capacity,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn key(method: &str, path: &str) -> String {
        format!("{method}:{path}")
    }

    /// Returns `Some(entry)` on a cache hit (`entry` itself may be `None`,
    /// i.e. a cached miss); `None` means "not cached, compute it."
    pub fn get(&self, key: &str) -> Option<Option<CachedMatch>> {
        use std::sync::atomic::Ordering;
        let hit = self.inner.read().get(key).cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    pub fn put(&self, key: String, value: Option<CachedMatch>) {
        let mut guard = self.inner.write();
        if guard.len() >= self.capacity {
            evict_half(&mut guard);
        }
        guard.insert(key, value);
    }

    pub fn clear(&self) {
        use std::sync::atomic::Ordering;
        self.inner.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn hit_rate(&self) -> f64 {
        use std::sync::atomic::Ordering;
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }
}

/// Drops roughly half of `map`'s entries in one sweep. Simpler than
/// per-entry LRU; acceptable because locality dominates.
fn evict_half<K: std::hash::Hash + Eq + Clone, V>(map: &mut HashMap<K, V>) {
    let drop_count = map.len() / 2;
    let victims: Vec<K> = map.keys().take(drop_count).cloned().collect();
    for k in victims {
        map.remove(&k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_cache_memoizes_and_skips_empty_segments() {
        let cache = SplitCache::new(4);
        assert_eq!(cache.split("/a//b/"), vec!["a", "b"]);
        assert_eq!(cache.split("/a//b/"), vec!["a", "b"]);
    }

    #[test]
    fn result_cache_evicts_half_when_full() {
        let cache: ResultCache = ResultCache::new(4);
        for i in 0..4 {
            cache.put(format!("GET:/p{i}"), None);
        }
        assert_eq!(cache.len(), 4);
        cache.put("GET:/p4".to_string(), None);
        assert!(cache.len() <= 4);
    }

    #[test]
    fn clear_resets_counters() {
        let cache = ResultCache::new(4);
        cache.put("GET:/a".into(), None);
        let _ = cache.get("GET:/a");
        let _ = cache.get("GET:/missing");
        cache.clear();
        assert_eq!(cache.hit_rate(), 0.0);
        assert_eq!(cache.len(), 0);
    }
}
