//! Error types for memocall.

use std::fmt;

use thiserror::Error;

/// Default result type for memocall.
pub type MemoResult<T> = Result<T, MemoError>;

/// Where an offending argument was passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPosition {
    /// Positional argument, by index.
    Positional(usize),

    /// Named argument, by name.
    Named(String),

    /// Nested inside another argument value.
    Nested(Box<ArgPosition>, usize),
}

impl fmt::Display for ArgPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgPosition::Positional(index) => write!(f, "#{}", index),
            ArgPosition::Named(name) => write!(f, "'{}'", name),
            ArgPosition::Nested(parent, index) => write!(f, "{}[{}]", parent, index),
        }
    }
}

/// Errors raised by memocall.
#[derive(Error, Debug)]
pub enum MemoError {
    #[error("Argument {position} is not hashable: {reason}")]
    ArgumentNotHashable {
        position: ArgPosition,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl MemoError {
    /// Creates a generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an unhashable-argument error.
    pub fn not_hashable<S: Into<String>>(position: ArgPosition, reason: S) -> Self {
        Self::ArgumentNotHashable {
            position,
            reason: reason.into(),
        }
    }
}

/// Error returned by an argument-keyed memoized call.
///
/// Key derivation failures and computation failures stay distinguishable;
/// the computation's own error is carried unchanged.
#[derive(Error, Debug)]
pub enum CallError<E> {
    #[error(transparent)]
    Memo(#[from] MemoError),

    #[error("Computation failed: {0}")]
    Computation(E),
}

impl<E> CallError<E> {
    /// Returns the computation error, if this is one.
    pub fn into_computation(self) -> Option<E> {
        match self {
            CallError::Computation(e) => Some(e),
            CallError::Memo(_) => None,
        }
    }

    /// True when the arguments could not be turned into a cache key.
    pub fn is_not_hashable(&self) -> bool {
        matches!(self, CallError::Memo(MemoError::ArgumentNotHashable { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        assert_eq!(ArgPosition::Positional(2).to_string(), "#2");
        assert_eq!(ArgPosition::Named("b".into()).to_string(), "'b'");

        let nested = ArgPosition::Nested(Box::new(ArgPosition::Named("xs".into())), 1);
        assert_eq!(nested.to_string(), "'xs'[1]");
    }

    #[test]
    fn test_not_hashable_message() {
        let err = MemoError::not_hashable(ArgPosition::Positional(0), "list is mutable");
        assert_eq!(
            err.to_string(),
            "Argument #0 is not hashable: list is mutable"
        );
    }

    #[test]
    fn test_call_error_variants() {
        let err: CallError<String> =
            MemoError::not_hashable(ArgPosition::Positional(0), "nan").into();
        assert!(err.is_not_hashable());
        assert!(err.into_computation().is_none());

        let err: CallError<String> = CallError::Computation("boom".to_string());
        assert!(!err.is_not_hashable());
        assert_eq!(err.to_string(), "Computation failed: boom");
        assert_eq!(err.into_computation().as_deref(), Some("boom"));
    }
}
