//! # memocall
//!
//! Memoizing call caches: wrap a pure computation and get back a callable
//! that computes each distinct argument combination at most once, even when
//! called from many threads or tasks at the same time.
//!
//! ## Modules
//!
//! - [`cache`] - Sync and async memoized functions, cache keys, statistics
//! - [`hooks`] - Observers for cache events (logging, metrics)
//! - [`cli`] - Command line demos
//! - [`types`] - Call arguments, configuration and errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::convert::Infallible;
//! use memocall::cache::memoize;
//!
//! let square = memoize(|n: &u64| Ok::<_, Infallible>(n * n));
//! assert_eq!(square.call(4)?, 16);
//! assert_eq!(square.call(4)?, 16); // served from the cache
//! assert_eq!(square.inspect().len(), 1);
//! square.clear();
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod hooks;
pub mod types;

pub use cache::{memoize, memoize_args, AsyncMemoized, CacheKey, MemoCache, Memoized};
pub use types::config::Config;
pub use types::errors::{CallError, MemoError, MemoResult};
