//! Thread-safe compute-if-absent cache.
//!
//! Used for entity metadata, rendered SQL and converter instances. Entries
//! are never evicted: the key space is bounded by the number of entity
//! types and operation names, not by request volume.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

/// A `RwLock<HashMap>` cache handing out shared `Arc` values.
///
/// Two threads racing on the same missing key may both compute a value; the
/// first one inserted wins and both callers receive that same `Arc`.
#[derive(Debug)]
pub struct SharedCache<K, V> {
    entries: RwLock<HashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash + Clone, V> SharedCache<K, V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get a cached value without computing it.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        // Recover from a poisoned lock: entries are only ever inserted whole.
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    /// Get a cached value or compute and insert it.
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> Arc<V> {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = Arc::new(compute());
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(entries.entry(key).or_insert(value))
    }

    /// Fallible variant of [`get_or_insert_with`](Self::get_or_insert_with).
    ///
    /// Errors are returned to the caller and nothing is cached.
    pub fn try_get_or_insert_with<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = Arc::new(compute()?);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(entries.entry(key).or_insert(value)))
    }

    /// Check if a key is cached.
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached entries.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl<K: Eq + Hash + Clone, V> Default for SharedCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cache_hit() {
        let cache: SharedCache<u32, String> = SharedCache::new();
        let first = cache.get_or_insert_with(1, || "SELECT 1".to_string());

        let called = std::cell::Cell::new(false);
        let second = cache.get_or_insert_with(1, || {
            called.set(true);
            "other".to_string()
        });
        assert!(!called.get());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_try_insert_does_not_cache_errors() {
        let cache: SharedCache<&str, i32> = SharedCache::new();
        let err: Result<Arc<i32>, &str> = cache.try_get_or_insert_with("k", || Err("boom"));
        assert!(err.is_err());
        assert!(cache.is_empty());

        let ok: Result<Arc<i32>, &str> = cache.try_get_or_insert_with("k", || Ok(7));
        assert_eq!(*ok.unwrap(), 7);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_access_converges() {
        let cache: Arc<SharedCache<u8, usize>> = Arc::new(SharedCache::new());
        let computed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let computed = Arc::clone(&computed);
                std::thread::spawn(move || {
                    *cache.get_or_insert_with(0, || {
                        computed.fetch_add(1, Ordering::SeqCst);
                        i
                    })
                })
            })
            .collect();

        let seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
        assert!(computed.load(Ordering::SeqCst) >= 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache: SharedCache<u8, u8> = SharedCache::default();
        cache.get_or_insert_with(1, || 1);
        cache.clear();
        assert!(!cache.contains(&1));
    }
}
