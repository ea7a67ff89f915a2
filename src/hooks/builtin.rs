//! Built-in cache hooks.
//!
//! - `LoggingHook`: reports cache events through tracing
//! - `MetricsHook`: counts cache events

use std::sync::atomic::{AtomicU64, Ordering};

use super::{CacheEvent, CacheHook};

// ═══════════════════════════════════════════════════════════════════════════
// LoggingHook
// ═══════════════════════════════════════════════════════════════════════════

/// Hook that logs cache events.
#[derive(Debug, Default)]
pub struct LoggingHook;

impl LoggingHook {
    /// Creates a new LoggingHook.
    pub fn new() -> Self {
        Self
    }
}

impl CacheHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_event(&self, event: &CacheEvent<'_>) {
        match event {
            CacheEvent::Hit { key } => {
                tracing::debug!(key = ?key, "Value from cache");
            }
            CacheEvent::Miss { key } => {
                tracing::debug!(key = ?key, "Cache miss, computing");
            }
            CacheEvent::Coalesced { key } => {
                tracing::debug!(key = ?key, "Waiting for in-flight computation");
            }
            CacheEvent::Stored { key, elapsed } => {
                tracing::debug!(
                    key = ?key,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "Computed value"
                );
            }
            CacheEvent::Failed { key, elapsed } => {
                tracing::warn!(
                    key = ?key,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "Computation failed, nothing cached"
                );
            }
            CacheEvent::Evicted { key } => {
                tracing::debug!(key = ?key, "Evicted least recently used entry");
            }
            CacheEvent::Cleared { entries } => {
                tracing::info!(entries, "Cache cleared");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MetricsHook
// ═══════════════════════════════════════════════════════════════════════════

/// Hook that counts cache events.
///
/// Share it between several caches to get aggregate numbers.
#[derive(Debug, Default)]
pub struct MetricsHook {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    stored: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
    clears: AtomicU64,

    /// Sum of computation times, in microseconds.
    compute_micros: AtomicU64,
}

impl MetricsHook {
    /// Creates a new MetricsHook.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn total_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn total_coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    pub fn total_stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn total_evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn total_clears(&self) -> u64 {
        self.clears.load(Ordering::Relaxed)
    }

    /// Share of lookups answered without computing (hits and coalesced waits).
    pub fn hit_rate(&self) -> f64 {
        let served = self.total_hits() + self.total_coalesced();
        let total = served + self.total_misses();
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    /// Mean computation time in milliseconds, failures included.
    pub fn average_compute_ms(&self) -> f64 {
        let runs = self.total_stored() + self.total_failures();
        if runs == 0 {
            0.0
        } else {
            self.compute_micros.load(Ordering::Relaxed) as f64 / runs as f64 / 1000.0
        }
    }

    /// Resets every counter.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.coalesced,
            &self.stored,
            &self.failures,
            &self.evictions,
            &self.clears,
            &self.compute_micros,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Returns the metrics as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "hits": self.total_hits(),
            "misses": self.total_misses(),
            "coalesced": self.total_coalesced(),
            "stored": self.total_stored(),
            "failures": self.total_failures(),
            "evictions": self.total_evictions(),
            "clears": self.total_clears(),
            "hit_rate": self.hit_rate(),
            "average_compute_ms": self.average_compute_ms(),
        })
    }

    fn add_elapsed(&self, elapsed: std::time::Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.compute_micros.fetch_add(micros, Ordering::Relaxed);
    }
}

impl CacheHook for MetricsHook {
    fn name(&self) -> &str {
        "metrics"
    }

    fn on_event(&self, event: &CacheEvent<'_>) {
        match event {
            CacheEvent::Hit { .. } => {
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
            CacheEvent::Miss { .. } => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
            CacheEvent::Coalesced { .. } => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
            }
            CacheEvent::Stored { elapsed, .. } => {
                self.stored.fetch_add(1, Ordering::Relaxed);
                self.add_elapsed(*elapsed);
            }
            CacheEvent::Failed { elapsed, .. } => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.add_elapsed(*elapsed);
            }
            CacheEvent::Evicted { .. } => {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
            CacheEvent::Cleared { .. } => {
                self.clears.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_logging_hook_name() {
        let hook = LoggingHook::new();
        assert_eq!(hook.name(), "logging");

        // Must not panic without a subscriber
        hook.on_event(&CacheEvent::Failed {
            key: &7,
            elapsed: Duration::from_millis(3),
        });
    }

    #[test]
    fn test_metrics_hook_counts() {
        let hook = MetricsHook::new();

        hook.on_event(&CacheEvent::Miss { key: &4 });
        hook.on_event(&CacheEvent::Stored {
            key: &4,
            elapsed: Duration::from_millis(2),
        });
        hook.on_event(&CacheEvent::Hit { key: &4 });
        hook.on_event(&CacheEvent::Hit { key: &4 });
        hook.on_event(&CacheEvent::Coalesced { key: &5 });
        hook.on_event(&CacheEvent::Miss { key: &6 });
        hook.on_event(&CacheEvent::Failed {
            key: &6,
            elapsed: Duration::from_millis(4),
        });

        assert_eq!(hook.total_hits(), 2);
        assert_eq!(hook.total_misses(), 2);
        assert_eq!(hook.total_coalesced(), 1);
        assert_eq!(hook.total_stored(), 1);
        assert_eq!(hook.total_failures(), 1);
        assert!((hook.hit_rate() - 0.6).abs() < 0.001);
        assert!((hook.average_compute_ms() - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_metrics_hook_empty() {
        let hook = MetricsHook::new();
        assert_eq!(hook.hit_rate(), 0.0);
        assert_eq!(hook.average_compute_ms(), 0.0);
    }

    #[test]
    fn test_metrics_hook_reset_and_json() {
        let hook = MetricsHook::new();
        hook.on_event(&CacheEvent::Evicted { key: &1 });
        hook.on_event(&CacheEvent::Cleared { entries: 3 });

        let json = hook.to_json();
        assert_eq!(json["evictions"], 1);
        assert_eq!(json["clears"], 1);

        hook.reset();
        assert_eq!(hook.total_evictions(), 0);
        assert_eq!(hook.total_clears(), 0);
    }
}
