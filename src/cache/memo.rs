//! Thread-safe memoization with at-most-once computation per key.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use super::key::CacheKey;
use super::store::{CacheEntry, CacheState, CacheStats, Counters, Entries};
use crate::hooks::{CacheEvent, HookSystem};
use crate::types::args::Args;
use crate::types::config::CacheConfig;
use crate::types::errors::CallError;

// ═══════════════════════════════════════════════════════════════════════════
// In-flight computations
// ═══════════════════════════════════════════════════════════════════════════

enum FlightState<V> {
    Running,
    /// `None` when the computation failed or panicked.
    Done(Option<V>),
}

/// Marker for a computation other callers can wait on.
struct Flight<V> {
    state: Mutex<FlightState<V>>,
    done: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Running),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> Option<V> {
        let mut state = self.state.lock();
        loop {
            if let FlightState::Done(value) = &*state {
                return value.clone();
            }
            self.done.wait(&mut state);
        }
    }

    fn finish(&self, value: Option<V>) {
        *self.state.lock() = FlightState::Done(value);
        self.done.notify_all();
    }
}

struct Inner<K, V> {
    entries: Entries<K, V>,
    in_flight: HashMap<K, Arc<Flight<V>>>,
    /// Bumped by `clear`; results of computations started earlier are not stored.
    generation: u64,
}

enum Lookup<V> {
    Found(V),
    Lead(Arc<Flight<V>>, u64),
}

/// Releases waiters if the leading computation fails or unwinds.
struct FlightGuard<'a, K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
{
    cache: &'a MemoCache<K, V>,
    key: &'a K,
    flight: Arc<Flight<V>>,
    generation: u64,
    armed: bool,
}

impl<'a, K, V> FlightGuard<'a, K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
{
    /// Hands `value` to the waiters and stores it. Returns `false` when a
    /// `clear` since the start of the computation kept it out of the cache.
    fn complete(mut self, value: V) -> bool {
        self.armed = false;
        let (stored, evicted) = {
            let mut inner = self.cache.inner.lock();
            self.cache.retire(&mut inner, self.key, &self.flight);
            if inner.generation == self.generation {
                (true, inner.entries.insert(self.key.clone(), value.clone()))
            } else {
                (false, None)
            }
        };
        self.flight.finish(Some(value));
        if let Some(evicted) = evicted {
            Counters::bump(&self.cache.counters.evictions);
            self.cache.hooks.emit(&CacheEvent::Evicted { key: &evicted });
        }
        stored
    }
}

impl<'a, K, V> Drop for FlightGuard<'a, K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
{
    fn drop(&mut self) {
        if self.armed {
            {
                let mut inner = self.cache.inner.lock();
                self.cache.retire(&mut inner, self.key, &self.flight);
            }
            self.flight.finish(None);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MemoCache
// ═══════════════════════════════════════════════════════════════════════════

/// Result cache keyed by `K`, safe to share between threads.
///
/// The map lock is held only for lookup and insert. Concurrent callers asking
/// for a key that is being computed block until that computation finishes and
/// receive its result, so each key is computed at most once. A failed
/// computation stores nothing; one of its waiters (or the next caller)
/// computes again.
///
/// A computation must not ask the same cache for its own key: it would wait
/// on itself. Recursing into other keys is fine.
pub struct MemoCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    counters: Counters,
    hooks: HookSystem,
}

impl<K, V> MemoCache<K, V>
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

    /// Returns the cached result for `key`, computing it on a miss.
    ///
    /// Errors from `compute` are returned unchanged and nothing is stored.
    pub fn get_or_try_compute<E, F>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        let (flight, generation) = match self.lookup(&key) {
            Lookup::Found(value) => return Ok(value),
            Lookup::Lead(flight, generation) => (flight, generation),
        };

        Counters::bump(&self.counters.misses);
        self.hooks.emit(&CacheEvent::Miss { key: &key });

        let guard = FlightGuard {
            cache: self,
            key: &key,
            flight,
            generation,
            armed: true,
        };
        let started = Instant::now();

        match compute(&key) {
            Ok(value) => {
                if guard.complete(value.clone()) {
                    self.hooks.emit(&CacheEvent::Stored {
                        key: &key,
                        elapsed: started.elapsed(),
                    });
                }
                Ok(value)
            }
            Err(e) => {
                drop(guard);
                Counters::bump(&self.counters.failures);
                self.hooks.emit(&CacheEvent::Failed {
                    key: &key,
                    elapsed: started.elapsed(),
                });
                Err(e)
            }
        }
    }

    /// Infallible form of [`get_or_try_compute`](Self::get_or_try_compute).
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        match self.get_or_try_compute(key, |k| Ok::<_, Infallible>(compute(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Finds a stored result, waits for an in-flight one, or registers this
    /// caller as the one computing `key`.
    fn lookup(&self, key: &K) -> Lookup<V> {
        loop {
            let mut inner = self.inner.lock();

            if let Some(value) = inner.entries.get(key) {
                let value = value.clone();
                drop(inner);
                Counters::bump(&self.counters.hits);
                self.hooks.emit(&CacheEvent::Hit { key });
                return Lookup::Found(value);
            }

            if let Some(flight) = inner.in_flight.get(key).cloned() {
                drop(inner);
                Counters::bump(&self.counters.coalesced);
                self.hooks.emit(&CacheEvent::Coalesced { key });
                match flight.wait() {
                    Some(value) => return Lookup::Found(value),
                    // The computation failed; try again
                    None => continue,
                }
            }

            let flight = Arc::new(Flight::new());
            inner.in_flight.insert(key.clone(), Arc::clone(&flight));
            return Lookup::Lead(flight, inner.generation);
        }
    }

    /// Removes `flight` from the in-flight map unless `clear` already did.
    fn retire(&self, inner: &mut Inner<K, V>, key: &K, flight: &Arc<Flight<V>>) {
        if inner
            .in_flight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, flight))
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

    /// True when a result is stored for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.lock().entries.contains(key)
    }

    /// Number of stored results.
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

    /// Number of computations currently running.
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

impl<K, V> Default for MemoCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for MemoCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Memoized functions
// ═══════════════════════════════════════════════════════════════════════════

/// A function bundled with the cache of its results.
///
/// ```rust,ignore
/// let square = memoize(|n: &u64| Ok::<_, Infallible>(n * n));
/// assert_eq!(square.call(4)?, 16);
/// square.clear();
/// ```
pub struct Memoized<K, V, F> {
    cache: MemoCache<K, V>,
    func: F,
}

impl<K, V, E, F> Memoized<K, V, F>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
    F: Fn(&K) -> Result<V, E>,
{
    /// Wraps `func` with an unbounded cache.
    pub fn new(func: F) -> Self {
        Self::with_cache(func, MemoCache::new())
    }

    /// Wraps `func` with the given cache.
    pub fn with_cache(func: F, cache: MemoCache<K, V>) -> Self {
        Self { cache, func }
    }

    /// Calls the function, or returns the result of an earlier call with an
    /// equal key.
    pub fn call(&self, key: K) -> Result<V, E> {
        self.cache.get_or_try_compute(key, |k| (self.func)(k))
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
    pub fn cache(&self) -> &MemoCache<K, V> {
        &self.cache
    }
}

/// Wraps `func` with an unbounded cache.
pub fn memoize<K, V, E, F>(func: F) -> Memoized<K, V, F>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
    F: Fn(&K) -> Result<V, E>,
{
    Memoized::new(func)
}

/// A function of positional and named arguments bundled with its cache.
pub struct ArgsMemoized<V, F> {
    cache: MemoCache<CacheKey, V>,
    func: F,
}

impl<V, E, F> ArgsMemoized<V, F>
where
    V: Clone,
    F: Fn(&Args) -> Result<V, E>,
{
    /// Wraps `func` with an unbounded cache.
    pub fn new(func: F) -> Self {
        Self::with_cache(func, MemoCache::new())
    }

    /// Wraps `func` with the given cache.
    pub fn with_cache(func: F, cache: MemoCache<CacheKey, V>) -> Self {
        Self { cache, func }
    }

    /// Calls the function with `args`, reusing the result of an earlier call
    /// with equal arguments.
    ///
    /// Unhashable arguments are rejected before the cache is touched.
    pub fn call(&self, args: &Args) -> Result<V, CallError<E>> {
        let key = CacheKey::derive(args)?;
        self.cache
            .get_or_try_compute(key, |_| (self.func)(args))
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
    pub fn cache(&self) -> &MemoCache<CacheKey, V> {
        &self.cache
    }
}

/// Wraps an argument-list function with an unbounded cache.
pub fn memoize_args<V, E, F>(func: F) -> ArgsMemoized<V, F>
where
    V: Clone,
    F: Fn(&Args) -> Result<V, E>,
{
    ArgsMemoized::new(func)
}
