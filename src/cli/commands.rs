//! memocall CLI commands.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{ArgsMemoized, AsyncMemoCache, MemoCache};
use crate::hooks::{HookSystem, MetricsHook};
use crate::types::args::Args;
use crate::types::config::{Config, DEFAULT_CONFIG_FILE};
use crate::{CallError, MemoError, MemoResult};

/// Largest index whose Fibonacci number fits in a u128.
pub const MAX_FIB_INDEX: u64 = 186;

/// Writes a default configuration in the specified directory.
pub async fn init(path: Option<PathBuf>) -> MemoResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join(DEFAULT_CONFIG_FILE);

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        return Ok(());
    }

    Config::default_config().save(&config_path)?;

    println!("Configuration created at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  memocall fib 90");
    println!("  memocall square 4 4 5");
    println!("  memocall stress --callers 16");

    Ok(())
}

/// Memoized Fibonacci, recursing through the cache.
fn fibonacci(cache: &MemoCache<u64, u128>, n: u64) -> MemoResult<u128> {
    cache.get_or_try_compute(n, |&n| {
        if n <= 1 {
            return Ok(u128::from(n));
        }
        let a = fibonacci(cache, n - 1)?;
        let b = fibonacci(cache, n - 2)?;
        a.checked_add(b)
            .ok_or_else(|| MemoError::other(format!("fib({}) does not fit in u128", n)))
    })
}

/// Computes the n-th Fibonacci number.
pub fn fib(n: u64, config: &Config) -> MemoResult<u128> {
    if n > MAX_FIB_INDEX {
        return Err(MemoError::config(format!(
            "n must be at most {}, got {}",
            MAX_FIB_INDEX, n
        )));
    }

    let cache = MemoCache::from_config(&config.cache);
    let started = Instant::now();
    let value = fibonacci(&cache, n)?;
    let elapsed = started.elapsed();

    // Second call is answered from the cache
    let cached = fibonacci(&cache, n)?;
    debug_assert_eq!(value, cached);

    let stats = cache.stats();
    println!("fib({}) = {}", n, value);
    println!(
        "computed in {:.3} ms: {} computations, {} cache hits, {} entries",
        elapsed.as_secs_f64() * 1000.0,
        stats.misses,
        stats.hits,
        stats.size
    );

    Ok(value)
}

/// Squares each value, printing whether the result came from the cache.
pub fn square(values: &[i64], config: &Config) -> MemoResult<Vec<i64>> {
    let calls = AtomicUsize::new(0);
    let squared = ArgsMemoized::with_cache(
        |args: &Args| {
            calls.fetch_add(1, Ordering::Relaxed);
            let n = args
                .get(0)
                .and_then(|v| v.as_int())
                .ok_or_else(|| MemoError::other("expected one integer argument"))?;
            n.checked_mul(n)
                .ok_or_else(|| MemoError::other(format!("{}² does not fit in i64", n)))
        },
        MemoCache::from_config(&config.cache),
    );

    let mut results = Vec::with_capacity(values.len());
    for &value in values {
        let before = calls.load(Ordering::Relaxed);
        let result = squared
            .call(&Args::positional([value]))
            .map_err(|e| match e {
                CallError::Memo(e) | CallError::Computation(e) => e,
            })?;
        let source = if calls.load(Ordering::Relaxed) == before {
            "value from cache"
        } else {
            "value from direct execution"
        };
        println!("square({}) = {}  [{}]", value, result, source);
        results.push(result);
    }

    let stats = squared.cache().stats();
    println!();
    println!(
        "{} calls, {} computations, hit rate {:.0}%",
        values.len(),
        stats.misses,
        stats.hit_rate() * 100.0
    );

    Ok(results)
}

/// Result of the stress demo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressReport {
    pub callers: usize,
    pub computations: usize,
    pub value: u64,
}

/// Calls one slow computation from `callers` tasks at the same time.
pub async fn stress(
    callers: Option<usize>,
    delay_ms: Option<u64>,
    config: &Config,
) -> MemoResult<StressReport> {
    let callers = callers.unwrap_or(config.demo.callers);
    let delay = Duration::from_millis(delay_ms.unwrap_or(config.demo.compute_delay_ms));
    if callers == 0 {
        return Err(MemoError::config("callers must be at least 1"));
    }

    let metrics = Arc::new(MetricsHook::new());
    let mut hooks = if config.cache.log_events {
        HookSystem::with_defaults()
    } else {
        HookSystem::new()
    };
    hooks.register(metrics.clone());

    let cache: Arc<AsyncMemoCache<u64, u64>> = Arc::new(
        AsyncMemoCache::with_capacity(config.cache.capacity_limit()).with_hooks(hooks),
    );
    let computations = Arc::new(AtomicUsize::new(0));

    tracing::info!(callers, delay_ms = delay.as_millis() as u64, "Starting stress demo");

    let mut handles = Vec::with_capacity(callers);
    for _ in 0..callers {
        let cache = Arc::clone(&cache);
        let computations = Arc::clone(&computations);
        handles.push(tokio::spawn(async move {
            cache
                .get_or_try_compute(21, |n| async move {
                    computations.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    Ok::<_, MemoError>(n * 2)
                })
                .await
        }));
    }

    let mut value = 0;
    for handle in handles {
        value = handle
            .await
            .map_err(|e| MemoError::other(format!("caller task failed: {}", e)))??;
    }

    let report = StressReport {
        callers,
        computations: computations.load(Ordering::SeqCst),
        value,
    };

    println!(
        "{} callers, {} computation(s), result {}",
        report.callers, report.computations, report.value
    );
    println!(
        "hits: {}, waited: {}, misses: {}",
        metrics.total_hits(),
        metrics.total_coalesced(),
        metrics.total_misses()
    );

    Ok(report)
}

/// Shows the effective configuration.
pub fn config_cmd(config: &Config) -> MemoResult<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Shows version.
pub fn version() {
    println!("memocall {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Memoizing call caches with at-most-once computation per key");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> Config {
        let mut config = Config::default_config();
        config.cache.log_events = false;
        config.demo.compute_delay_ms = 20;
        config.demo.callers = 4;
        config
    }

    #[test]
    fn test_fib_values() {
        let config = quiet_config();
        assert_eq!(fib(0, &config).unwrap(), 0);
        assert_eq!(fib(10, &config).unwrap(), 55);
        assert_eq!(
            fib(MAX_FIB_INDEX, &config).unwrap(),
            332_825_110_087_067_562_321_196_029_789_634_457_848
        );
    }

    #[test]
    fn test_fib_rejects_large_index() {
        let err = fib(MAX_FIB_INDEX + 1, &quiet_config()).unwrap_err();
        assert!(matches!(err, MemoError::Config(_)));
    }

    #[test]
    fn test_fib_with_bounded_cache() {
        let mut config = quiet_config();
        config.cache.capacity = 4;
        assert_eq!(fib(50, &config).unwrap(), 12_586_269_025);
    }

    #[test]
    fn test_square_repeats() {
        let results = square(&[4, 4, 5, -3], &quiet_config()).unwrap();
        assert_eq!(results, vec![16, 16, 25, 9]);
    }

    #[test]
    fn test_square_overflow() {
        let err = square(&[i64::MAX], &quiet_config()).unwrap_err();
        assert!(matches!(err, MemoError::Other(_)));
    }

    #[tokio::test]
    async fn test_stress_computes_once() {
        let report = stress(None, None, &quiet_config()).await.unwrap();
        assert_eq!(
            report,
            StressReport {
                callers: 4,
                computations: 1,
                value: 42
            }
        );
    }

    #[tokio::test]
    async fn test_stress_rejects_zero_callers() {
        let err = stress(Some(0), Some(1), &quiet_config()).await.unwrap_err();
        assert!(matches!(err, MemoError::Config(_)));
    }

    #[tokio::test]
    async fn test_init_writes_config() {
        let dir = tempfile::tempdir().unwrap();
        init(Some(dir.path().to_path_buf())).await.unwrap();

        let config = Config::load(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config.general.log_level, "info");
    }
}
