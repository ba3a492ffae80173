//! LRU cache for decoded result records.
//!
//! Result transactions are immutable once written, so a record decoded from a
//! given result transaction id never changes and can be served from memory.

use super::data_types::{ResultRecord, ResultTxId};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// LRU cache of result records keyed by result transaction id.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<Mutex<LruCache<ResultTxId, ResultRecord>>>,
    stats: Arc<Mutex<CacheStats>>,
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries added.
    pub additions: u64,
}

impl CacheStats {
    /// Hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl ResultCache {
    /// Create a cache holding up to `capacity` records (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    /// Look up a record.
    pub fn get(&self, tx_id: &ResultTxId) -> Option<ResultRecord> {
        let found = self.inner.lock().get(tx_id).cloned();

        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }

        found
    }

    /// Store a decoded record.
    pub fn insert(&self, tx_id: ResultTxId, record: ResultRecord) {
        self.inner.lock().put(tx_id, record);
        self.stats.lock().additions += 1;
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop every cached record.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
