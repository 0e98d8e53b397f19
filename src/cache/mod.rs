//! Kernel row cache
//!
//! The SMO solver repeatedly needs full rows `Q[i][*]` of the kernel matrix for
//! the two variables of its working set. Rows are expensive (one kernel
//! evaluation per training sample), so recently used rows are kept in an LRU
//! cache sized from the solver's `cache_size` budget.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Minimum number of rows kept, the working set needs two at once
const MIN_ROWS: usize = 2;

/// LRU cache of kernel matrix rows
pub struct KernelCache {
    rows: LruCache<usize, Arc<[f64]>>,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a cache holding at most `capacity` rows
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(MIN_ROWS)).unwrap_or(NonZeroUsize::MIN);
        Self {
            rows: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Create a cache for rows of `row_len` values within `megabytes` of memory
    pub fn with_memory_limit(megabytes: f64, row_len: usize) -> Self {
        let bytes = (megabytes.max(0.0) * 1024.0 * 1024.0) as usize;
        let row_bytes = row_len.max(1) * std::mem::size_of::<f64>();
        Self::new(bytes / row_bytes)
    }

    /// Fetch row `i`, computing and caching it on a miss
    pub fn row<F>(&mut self, i: usize, compute: F) -> Arc<[f64]>
    where
        F: FnOnce() -> Vec<f64>,
    {
        if let Some(row) = self.rows.get(&i) {
            self.hits += 1;
            return Arc::clone(row);
        }

        self.misses += 1;
        let row: Arc<[f64]> = compute().into();
        self.rows.put(i, Arc::clone(&row));
        row
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.rows.cap().get(),
            size: self.rows.len(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_cache_hit_and_miss() {
        let mut cache = KernelCache::new(4);

        let row = cache.row(0, || vec![1.0, 2.0]);
        assert_eq!(&*row, &[1.0, 2.0]);
        assert_eq!(cache.stats().misses, 1);

        // the closure must not run on a hit
        let row = cache.row(0, || panic!("row 0 should be cached"));
        assert_eq!(&*row, &[1.0, 2.0]);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.hit_rate(), 0.5);
    }

    #[test]
    fn test_row_cache_lru_eviction() {
        let mut cache = KernelCache::new(2);

        cache.row(0, || vec![0.0]);
        cache.row(1, || vec![1.0]);
        cache.row(2, || vec![2.0]); // evicts row 0

        let mut recomputed = false;
        cache.row(0, || {
            recomputed = true;
            vec![0.0]
        });
        assert!(recomputed);
        assert_eq!(cache.stats().size, 2);
    }

    #[test]
    fn test_cache_with_memory_limit() {
        // 1 MB of 1024-value rows is 128 rows
        let cache = KernelCache::with_memory_limit(1.0, 1024);
        assert_eq!(cache.stats().capacity, 128);

        // never below two rows
        let tiny = KernelCache::with_memory_limit(0.0, 1024);
        assert_eq!(tiny.stats().capacity, 2);
    }
}
