//! Entry storage and statistics shared by the sync and async caches.

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use lru::LruCache;

/// A stored (key, result) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<K, V> {
    /// Key the result was computed for.
    pub key: K,

    /// Computed result.
    pub value: V,

    /// When the result was stored.
    pub cached_at: DateTime<Utc>,
}

/// Observable state of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No entries.
    Empty,
    /// At least one entry.
    Populated,
}

/// Stored result with its creation time.
#[derive(Debug, Clone)]
pub(crate) struct Stored<V> {
    value: V,
    cached_at: DateTime<Utc>,
}

impl<V> Stored<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
        }
    }
}

/// Completed results, unbounded or LRU-bounded.
pub(crate) enum Entries<K, V> {
    Unbounded(HashMap<K, Stored<V>>),
    Bounded(LruCache<K, Stored<V>>),
}

impl<K, V> Entries<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        match capacity.and_then(NonZeroUsize::new) {
            Some(cap) => Entries::Bounded(LruCache::new(cap)),
            None => Entries::Unbounded(HashMap::new()),
        }
    }

    /// Looks up a result, marking it as recently used.
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        match self {
            Entries::Unbounded(map) => map.get(key).map(|s| &s.value),
            Entries::Bounded(lru) => lru.get(key).map(|s| &s.value),
        }
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        match self {
            Entries::Unbounded(map) => map.contains_key(key),
            Entries::Bounded(lru) => lru.contains(key),
        }
    }

    /// Stores a result for a key that has none yet.
    ///
    /// Returns the key evicted to make room, if any. An existing entry is
    /// left untouched so a stored result never changes.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<K> {
        if self.contains(&key) {
            return None;
        }
        match self {
            Entries::Unbounded(map) => {
                map.insert(key, Stored::new(value));
                None
            }
            Entries::Bounded(lru) => {
                let evicted = if lru.len() >= lru.cap().get() {
                    lru.pop_lru().map(|(k, _)| k)
                } else {
                    None
                };
                lru.put(key, Stored::new(value));
                evicted
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Entries::Unbounded(map) => map.len(),
            Entries::Bounded(lru) => lru.len(),
        }
    }

    pub(crate) fn capacity(&self) -> Option<usize> {
        match self {
            Entries::Unbounded(_) => None,
            Entries::Bounded(lru) => Some(lru.cap().get()),
        }
    }

    /// Drops every entry, returning how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.len();
        match self {
            Entries::Unbounded(map) => map.clear(),
            Entries::Bounded(lru) => lru.clear(),
        }
        count
    }

    pub(crate) fn snapshot(&self) -> HashMap<K, V> {
        match self {
            Entries::Unbounded(map) => map
                .iter()
                .map(|(k, s)| (k.clone(), s.value.clone()))
                .collect(),
            Entries::Bounded(lru) => lru
                .iter()
                .map(|(k, s)| (k.clone(), s.value.clone()))
                .collect(),
        }
    }

    pub(crate) fn entries(&self) -> Vec<CacheEntry<K, V>> {
        let to_entry = |(k, s): (&K, &Stored<V>)| CacheEntry {
            key: k.clone(),
            value: s.value.clone(),
            cached_at: s.cached_at,
        };
        match self {
            Entries::Unbounded(map) => map.iter().map(to_entry).collect(),
            Entries::Bounded(lru) => lru.iter().map(to_entry).collect(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Current number of entries.
    pub size: usize,

    /// Capacity bound, `None` when unbounded.
    pub capacity: Option<usize>,

    /// Lookups answered from a stored entry.
    pub hits: u64,

    /// Lookups that ran the computation.
    pub misses: u64,

    /// Lookups that waited for another caller's computation.
    pub coalesced: u64,

    /// Computations that failed.
    pub failures: u64,

    /// Entries dropped by the capacity bound.
    pub evictions: u64,
}

impl CacheStats {
    /// Share of lookups answered without computing.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.coalesced;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) coalesced: AtomicU64,
    pub(crate) failures: AtomicU64,
    pub(crate) evictions: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, size: usize, capacity: Option<usize>) -> CacheStats {
        CacheStats {
            size,
            capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_evicts() {
        let mut entries: Entries<u32, u32> = Entries::new(None);
        for i in 0..100 {
            assert_eq!(entries.insert(i, i * i), None);
        }
        assert_eq!(entries.len(), 100);
        assert_eq!(entries.capacity(), None);
        assert_eq!(entries.get(&9), Some(&81));
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let entries: Entries<u32, u32> = Entries::new(Some(0));
        assert_eq!(entries.capacity(), None);
    }

    #[test]
    fn test_bounded_evicts_least_recently_used() {
        let mut entries: Entries<&str, u32> = Entries::new(Some(2));

        entries.insert("key1", 1);
        entries.insert("key2", 2);
        entries.get(&"key1");
        let evicted = entries.insert("key3", 3);

        assert_eq!(evicted, Some("key2"));
        assert!(entries.contains(&"key1"));
        assert!(entries.contains(&"key3"));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_insert_keeps_first_value() {
        let mut entries: Entries<u32, &str> = Entries::new(None);
        entries.insert(1, "first");
        entries.insert(1, "second");

        assert_eq!(entries.get(&1), Some(&"first"));
    }

    #[test]
    fn test_clear_and_snapshot() {
        let mut entries: Entries<u32, u32> = Entries::new(Some(10));
        entries.insert(1, 10);
        entries.insert(2, 20);

        let snapshot = entries.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&2], 20);
        assert_eq!(entries.entries().len(), 2);

        assert_eq!(entries.clear(), 2);
        assert_eq!(entries.len(), 0);
        assert!(entries.snapshot().is_empty());
    }

    #[test]
    fn test_stats_hit_rate() {
        let stats = CacheStats {
            hits: 2,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.666).abs() < 0.01);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
