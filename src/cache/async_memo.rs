//! Memoization for async computations.
//!
//! Same contract as [`MemoCache`](super::MemoCache), for tasks: callers that
//! find a computation in flight suspend until it finishes instead of starting
//! their own. Dropping a waiting caller affects nobody else; if the caller
//! running the computation is dropped, one waiter takes over.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use super::key::CacheKey;
use super::store::{CacheEntry, CacheState, CacheStats, Counters, Entries};
use crate::hooks::{CacheEvent, HookSystem};
use crate::types::args::Args;
use crate::types::config::CacheConfig;
use crate::types::errors::CallError;

struct Inner<K, V> {
    entries: Entries<K, V>,
    in_flight: HashMap<K, Arc<OnceCell<V>>>,
    generation: u64,
}

/// Async result cache keyed by `K`.
///
/// The map lock is never held across an `.await`.
pub struct AsyncMemoCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    counters: Counters,
    hooks: HookSystem,
}

impl<K, V> AsyncMemoCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
{
    /// Creates an unbounded cache.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Creates a cache, LRU-bounded when `capacity` is set.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Entries::new(capacity),
                in_flight: HashMap::new(),
                generation: 0,
            }),
            counters: Counters::default(),
            hooks: HookSystem::new(),
        }
    }

    /// Creates a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        let cache = Self::with_capacity(config.capacity_limit());
        if config.log_events {
            cache.with_hooks(HookSystem::with_defaults())
        } else {
            cache
        }
    }

    /// Replaces the hooks of this cache.
    pub fn with_hooks(mut self, hooks: HookSystem) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns the cached result for `key`, awaiting `compute` on a miss.
    ///
    /// Errors from `compute` are returned unchanged and nothing is stored.
    pub async fn get_or_try_compute<E, F, Fut>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let (cell, generation) = {
            let mut inner = self.inner.lock();
            if let Some(value) = inner.entries.get(&key) {
                let value = value.clone();
                drop(inner);
                Counters::bump(&self.counters.hits);
                self.hooks.emit(&CacheEvent::Hit { key: &key });
                return Ok(value);
            }
            let generation = inner.generation;
            let cell = Arc::clone(
                inner
                    .in_flight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            );
            (cell, generation)
        };

        let mut ran = false;
        let started = Instant::now();
        let outcome = cell
            .get_or_try_init(|| {
                ran = true;
                Counters::bump(&self.counters.misses);
                self.hooks.emit(&CacheEvent::Miss { key: &key });
                compute(key.clone())
            })
            .await
            .map(V::clone);

        match outcome {
            Ok(value) if ran => {
                if self.settle(&key, &cell, generation, value.clone()) {
                    self.hooks.emit(&CacheEvent::Stored {
                        key: &key,
                        elapsed: started.elapsed(),
                    });
                }
                Ok(value)
            }
            Ok(value) => {
                Counters::bump(&self.counters.coalesced);
                self.hooks.emit(&CacheEvent::Coalesced { key: &key });
                Ok(value)
            }
            Err(e) => {
                self.abandon(&key, &cell);
                Counters::bump(&self.counters.failures);
                self.hooks.emit(&CacheEvent::Failed {
                    key: &key,
                    elapsed: started.elapsed(),
                });
                Err(e)
            }
        }
    }

    /// Moves a finished computation from the in-flight map into the entries.
    /// Returns `false` when a `clear` since the computation started kept the
    /// value out.
    fn settle(&self, key: &K, cell: &Arc<OnceCell<V>>, generation: u64, value: V) -> bool {
        let (stored, evicted) = {
            let mut inner = self.inner.lock();
            if inner
                .in_flight
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, cell))
            {
                inner.in_flight.remove(key);
            }
            if inner.generation == generation {
                (true, inner.entries.insert(key.clone(), value))
            } else {
                (false, None)
            }
        };
        if let Some(evicted) = evicted {
            Counters::bump(&self.counters.evictions);
            self.hooks.emit(&CacheEvent::Evicted { key: &evicted });
        }
        stored
    }

    /// Drops an empty cell after a failure unless someone else holds it.
    fn abandon(&self, key: &K, cell: &Arc<OnceCell<V>>) {
        let mut inner = self.inner.lock();
        // Clones of the cell are only taken under this lock: two references
        // mean the map and this caller.
        if !cell.initialized()
            && Arc::strong_count(cell) == 2
            && inner
                .in_flight
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, cell))
        {
            inner.in_flight.remove(key);
        }
    }

    /// Empties the cache.
    ///
    /// Computations still running finish for their callers, but their
    /// results are not stored.
    pub fn clear(&self) {
        let entries = {
            let mut inner = self.inner.lock();
            inner.in_flight.clear();
            inner.generation += 1;
            inner.entries.clear()
        };
        self.hooks.emit(&CacheEvent::Cleared { entries });
    }

    /// Snapshot of the stored results.
    pub fn inspect(&self) -> HashMap<K, V> {
        self.inner.lock().entries.snapshot()
    }

    /// Snapshot of the stored entries with their creation time.
    pub fn entries(&self) -> Vec<CacheEntry<K, V>> {
        self.inner.lock().entries.entries()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.lock().entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> CacheState {
        if self.is_empty() {
            CacheState::Empty
        } else {
            CacheState::Populated
        }
    }

    /// Number of keys with a computation running or pending retry.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        self.counters
            .snapshot(inner.entries.len(), inner.entries.capacity())
    }
}

impl<K, V> Default for AsyncMemoCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for AsyncMemoCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncMemoCache")
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Memoized async functions
// ═══════════════════════════════════════════════════════════════════════════

/// An async function bundled with the cache of its results.
pub struct AsyncMemoized<K, V, F> {
    cache: AsyncMemoCache<K, V>,
    func: F,
}

impl<K, V, E, F, Fut> AsyncMemoized<K, V, F>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    /// Wraps `func` with an unbounded cache.
    pub fn new(func: F) -> Self {
        Self::with_cache(func, AsyncMemoCache::new())
    }

    /// Wraps `func` with the given cache.
    pub fn with_cache(func: F, cache: AsyncMemoCache<K, V>) -> Self {
        Self { cache, func }
    }

    /// Calls the function, or returns the result of an earlier call with an
    /// equal key.
    pub async fn call(&self, key: K) -> Result<V, E> {
        self.cache.get_or_try_compute(key, |k| (self.func)(k)).await
    }

    /// Empties the cache.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Snapshot of the cached results.
    pub fn inspect(&self) -> HashMap<K, V> {
        self.cache.inspect()
    }

    /// The underlying cache.
    pub fn cache(&self) -> &AsyncMemoCache<K, V> {
        &self.cache
    }
}

/// An async function of positional and named arguments bundled with its cache.
pub struct AsyncArgsMemoized<V, F> {
    cache: AsyncMemoCache<CacheKey, V>,
    func: F,
}

impl<V, E, F, Fut> AsyncArgsMemoized<V, F>
where
    V: Clone,
    F: Fn(Args) -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    /// Wraps `func` with an unbounded cache.
    pub fn new(func: F) -> Self {
        Self::with_cache(func, AsyncMemoCache::new())
    }

    /// Wraps `func` with the given cache.
    pub fn with_cache(func: F, cache: AsyncMemoCache<CacheKey, V>) -> Self {
        Self { cache, func }
    }

    /// Calls the function with `args`, reusing the result of an earlier call
    /// with equal arguments.
    pub async fn call(&self, args: Args) -> Result<V, CallError<E>> {
        let key = CacheKey::derive(&args)?;
        self.cache
            .get_or_try_compute(key, |_| (self.func)(args))
            .await
            .map_err(CallError::Computation)
    }

    /// Empties the cache.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Snapshot of the cached results.
    pub fn inspect(&self) -> HashMap<CacheKey, V> {
        self.cache.inspect()
    }

    /// The underlying cache.
    pub fn cache(&self) -> &AsyncMemoCache<CacheKey, V> {
        &self.cache
    }
}
