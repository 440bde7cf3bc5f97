//! LRU cache of opened chromosome arrays.
//!
//! Opening an array reads its metadata document from the store. Tiles at the
//! same zoom level hit the same few `(chromosome, resolution)` arrays over and
//! over, so the handles are kept around. Tile data itself is never cached.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::CacheStats;

/// Cache key: (chromosome name, resolution).
pub type ArrayKey = (String, u64);

/// Bounded LRU map from `(chromosome, resolution)` to a shared handle.
pub struct ArrayCache<V> {
    cache: LruCache<ArrayKey, Arc<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> ArrayCache<V> {
    /// Create a cache holding at most `capacity` handles (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a handle, updating recency and hit/miss counters.
    pub fn get(&mut self, chrom: &str, resolution: u64) -> Option<Arc<V>> {
        let key = (chrom.to_string(), resolution);
        if let Some(handle) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(Arc::clone(handle))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Insert a handle, evicting the least recently used one when full.
    pub fn insert(&mut self, chrom: &str, resolution: u64, handle: Arc<V>) {
        self.cache.put((chrom.to_string(), resolution), handle);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_insert_and_get() {
        let mut cache = ArrayCache::new(4);

        assert!(cache.get("chr1", 100).is_none());
        cache.insert("chr1", 100, Arc::new("handle".to_string()));
        assert_eq!(cache.get("chr1", 100).as_deref(), Some(&"handle".to_string()));
        assert!(cache.get("chr1", 10).is_none());
    }

    #[test]
    fn test_cache_lru_eviction() {
        let mut cache = ArrayCache::new(2);
        cache.insert("chr1", 1, Arc::new(1));
        cache.insert("chr2", 1, Arc::new(2));

        // Touch chr1 so chr2 becomes least recently used
        assert!(cache.get("chr1", 1).is_some());
        cache.insert("chr3", 1, Arc::new(3));

        assert!(cache.get("chr2", 1).is_none());
        assert!(cache.get("chr1", 1).is_some());
        assert!(cache.get("chr3", 1).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_stats() {
        let mut cache = ArrayCache::new(8);
        cache.insert("chr1", 1, Arc::new(()));

        cache.get("chr1", 1);
        cache.get("chr9", 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_zero_capacity_still_holds_one() {
        let mut cache = ArrayCache::new(0);
        cache.insert("chr1", 1, Arc::new(()));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
