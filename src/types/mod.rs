//! Shared types: call arguments, configuration and errors.

pub mod args;
pub mod config;
pub mod errors;

pub use args::{ArgValue, Args};
pub use config::{CacheConfig, Config};
pub use errors::{ArgPosition, CallError, MemoError, MemoResult};
