//! Memoizing call caches.
//!
//! A memoized computation remembers its result per distinct key and returns
//! it on later calls instead of recomputing. Keys are either a typed value
//! (`Memoized`, `AsyncMemoized`) or a [`CacheKey`] derived from positional
//! and named arguments (`ArgsMemoized`, `AsyncArgsMemoized`).
//!
//! Every cache is an explicit instance owned by whoever builds it, with
//! `clear` and `inspect` alongside the call. Concurrent callers of the same
//! key share a single computation.

mod async_memo;
mod key;
mod memo;
mod store;

pub use async_memo::{AsyncArgsMemoized, AsyncMemoCache, AsyncMemoized};
pub use key::{CacheKey, KeyValue};
pub use memo::{memoize, memoize_args, ArgsMemoized, MemoCache, Memoized};
pub use store::{CacheEntry, CacheState, CacheStats};
