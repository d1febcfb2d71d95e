//! Bounded pool of reusable parameter maps.
//!
//! A lookup that captures path parameters pulls an empty `HashMap` from here
//! instead of allocating one. The map is returned after the request that
//! captured it is released, keeping steady-state lookups allocation-free.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Owned parameter map handed out by [`ParamPool::acquire`].
pub type ParamsMap = HashMap<String, String>;

/// A bounded stack of reusable, empty [`ParamsMap`]s.
///
/// Thread-safe: `acquire`/`release` may be called concurrently from however
/// many tasks the host runtime is driving requests on.
pub struct ParamPool {
    slots: Mutex<Vec<ParamsMap>>,
    capacity: usize,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl ParamPool {
    /// Creates a pool with room for `capacity` idle maps (default ~200).
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Pops a reusable map, clearing any residual keys, or allocates a fresh one.
    pub fn acquire(&self) -> ParamsMap {
        use std::sync::atomic::Ordering;

        let mut slots = self.slots.lock();
        match slots.pop() {
            Some(mut map) => {
                map.clear();
                self.hits.fetch_add(1, Ordering::Relaxed);
                map
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                HashMap::new()
            }
        }
    }

    /// Returns a map to the pool if there is room, otherwise drops it.
    pub fn release(&self, mut map: ParamsMap) {
        map.clear();
        let mut slots = self.slots.lock();
        if slots.len() < self.capacity {
            slots.push(map);
        }
    }

    /// Fraction of `acquire` calls served from the pool rather than freshly allocated.
    pub fn hit_rate(&self) -> f64 {
        use std::sync::atomic::Ordering;
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_released_maps() {
        let pool = ParamPool::new(4);
        let mut m = pool.acquire();
        m.insert("id".into(), "42".into());
        pool.release(m);

        let reused = pool.acquire();
        assert!(reused.is_empty(), "released map must be cleared before reuse");
        assert!(pool.hit_rate() > 0.0);
    }

    #[test]
    fn drops_beyond_capacity() {
        let pool = ParamPool::new(1);
        pool.release(HashMap::new());
        pool.release(HashMap::new());
        assert_eq!(pool.slots.lock().len(), 1);
    }
}
