use crate::core::{EntityKey, Record};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Shared second-level cache of one factory
///
/// Bounded LRU over entity records, shared by every context the factory
/// creates. Entries survive `PersistenceContext::clear` and are only dropped
/// by eviction.
pub struct SecondLevelCache {
    entries: Mutex<LruCache<EntityKey, Record>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl SecondLevelCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    // Every operation leaves the LRU consistent, so a poisoned lock is still safe to use.
    fn entries(&self) -> MutexGuard<'_, LruCache<EntityKey, Record>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &EntityKey) -> Option<Record> {
        let found = self.entries().get(key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn put(&self, key: EntityKey, record: Record) {
        let mut entries = self.entries();
        if let Some((evicted, _)) = entries.push(key.clone(), record) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Drop one entry, returning whether it was cached
    pub fn evict(&self, key: &EntityKey) -> bool {
        let removed = self.entries().pop(key).is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Drop every entry, returning how many were cached
    pub fn evict_all(&self) -> usize {
        let mut entries = self.entries();
        let removed = entries.len();
        entries.clear();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entries().contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries();
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Second-level cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache Stats: {}/{} entries, {} hits, {} misses, {} evictions",
            self.entries, self.capacity, self.hits, self.misses, self.evictions
        )
    }
}
