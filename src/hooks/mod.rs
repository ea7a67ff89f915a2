//! Cache hooks.
//!
//! Hooks observe what a memoized computation does without taking part in
//! it. Every cache owns a [`HookSystem`] and emits a [`CacheEvent`] at these
//! points:
//!
//! - `hit`: result served from the cache
//! - `miss`: no entry, this caller computes
//! - `coalesced`: another caller was already computing the same key
//! - `stored` / `failed`: the computation finished
//! - `evicted`: a bounded cache dropped its least recently used entry
//! - `cleared`: the cache was emptied

mod builtin;

pub use builtin::{LoggingHook, MetricsHook};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// Event types
// ═══════════════════════════════════════════════════════════════════════════

/// Kind of a cache event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEventKind {
    Hit,
    Miss,
    Coalesced,
    Stored,
    Failed,
    Evicted,
    Cleared,
}

impl fmt::Display for CacheEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheEventKind::Hit => write!(f, "hit"),
            CacheEventKind::Miss => write!(f, "miss"),
            CacheEventKind::Coalesced => write!(f, "coalesced"),
            CacheEventKind::Stored => write!(f, "stored"),
            CacheEventKind::Failed => write!(f, "failed"),
            CacheEventKind::Evicted => write!(f, "evicted"),
            CacheEventKind::Cleared => write!(f, "cleared"),
        }
    }
}

/// Event emitted by a cache.
#[derive(Debug, Clone, Copy)]
pub enum CacheEvent<'a> {
    /// Result served from the cache.
    Hit { key: &'a dyn fmt::Debug },

    /// No entry; the caller runs the computation.
    Miss { key: &'a dyn fmt::Debug },

    /// The caller waited for another caller's computation.
    Coalesced { key: &'a dyn fmt::Debug },

    /// Computation succeeded and its result was stored. Not emitted when a
    /// `clear` during the computation kept the result out.
    Stored {
        key: &'a dyn fmt::Debug,
        elapsed: Duration,
    },

    /// Computation failed; nothing was stored.
    Failed {
        key: &'a dyn fmt::Debug,
        elapsed: Duration,
    },

    /// Entry dropped to respect the capacity bound.
    Evicted { key: &'a dyn fmt::Debug },

    /// Cache emptied.
    Cleared { entries: usize },
}

impl<'a> CacheEvent<'a> {
    /// Returns the kind of this event.
    pub fn kind(&self) -> CacheEventKind {
        match self {
            CacheEvent::Hit { .. } => CacheEventKind::Hit,
            CacheEvent::Miss { .. } => CacheEventKind::Miss,
            CacheEvent::Coalesced { .. } => CacheEventKind::Coalesced,
            CacheEvent::Stored { .. } => CacheEventKind::Stored,
            CacheEvent::Failed { .. } => CacheEventKind::Failed,
            CacheEvent::Evicted { .. } => CacheEventKind::Evicted,
            CacheEvent::Cleared { .. } => CacheEventKind::Cleared,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CacheHook trait
// ═══════════════════════════════════════════════════════════════════════════

/// Observer of cache events.
///
/// Hooks run on the calling thread, outside the cache lock, and must not call
/// back into the cache that emitted the event with the same key.
pub trait CacheHook: Send + Sync {
    /// Hook name.
    fn name(&self) -> &str;

    /// Handles one event.
    fn on_event(&self, event: &CacheEvent<'_>);
}

// ═══════════════════════════════════════════════════════════════════════════
// Hook system
// ═══════════════════════════════════════════════════════════════════════════

/// Ordered set of hooks attached to one cache.
#[derive(Clone, Default)]
pub struct HookSystem {
    hooks: Vec<Arc<dyn CacheHook>>,
}

impl HookSystem {
    /// Creates an empty hook system.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Creates a system with the logging hook registered.
    pub fn with_defaults() -> Self {
        let mut system = Self::new();
        system.register(Arc::new(LoggingHook));
        system
    }

    /// Registers a hook. Hooks run in registration order.
    pub fn register(&mut self, hook: Arc<dyn CacheHook>) {
        tracing::debug!(hook_name = hook.name(), "Registering cache hook");
        self.hooks.push(hook);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, hook: Arc<dyn CacheHook>) -> Self {
        self.register(hook);
        self
    }

    /// Delivers an event to every hook.
    pub fn emit(&self, event: &CacheEvent<'_>) {
        for hook in &self.hooks {
            hook.on_event(event);
        }
    }

    /// Number of registered hooks.
    pub fn count(&self) -> usize {
        self.hooks.len()
    }

    /// True when no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for HookSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    // Records event kinds in order
    #[derive(Default)]
    struct RecordingHook {
        seen: Mutex<Vec<CacheEventKind>>,
    }

    impl CacheHook for RecordingHook {
        fn name(&self) -> &str {
            "recording"
        }

        fn on_event(&self, event: &CacheEvent<'_>) {
            self.seen.lock().push(event.kind());
        }
    }

    #[test]
    fn test_hook_system_new() {
        let system = HookSystem::new();
        assert_eq!(system.count(), 0);
        assert!(system.is_empty());
    }

    #[test]
    fn test_hook_system_with_defaults() {
        let system = HookSystem::with_defaults();
        assert_eq!(system.count(), 1);
        assert_eq!(format!("{:?}", system), "[\"logging\"]");
    }

    #[test]
    fn test_emit_reaches_every_hook() {
        let first = Arc::new(RecordingHook::default());
        let second = Arc::new(RecordingHook::default());
        let system = HookSystem::new()
            .with(first.clone())
            .with(second.clone());

        system.emit(&CacheEvent::Miss { key: &4 });
        system.emit(&CacheEvent::Stored {
            key: &4,
            elapsed: Duration::from_millis(1),
        });
        system.emit(&CacheEvent::Cleared { entries: 1 });

        let expected = vec![
            CacheEventKind::Miss,
            CacheEventKind::Stored,
            CacheEventKind::Cleared,
        ];
        assert_eq!(*first.seen.lock(), expected);
        assert_eq!(*second.seen.lock(), expected);
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(CacheEventKind::Coalesced.to_string(), "coalesced");
        assert_eq!(CacheEvent::Hit { key: &"a" }.kind(), CacheEventKind::Hit);
    }
}
