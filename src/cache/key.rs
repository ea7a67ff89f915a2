//! Cache keys derived from call arguments.

use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};

use crate::types::args::{ArgValue, Args};
use crate::types::errors::{ArgPosition, MemoError};
use crate::MemoResult;

/// Hashable form of an argument value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    None,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    /// IEEE-754 bits, with `-0.0` folded into `0.0`.
    Float(u64),
    Str(String),
    Tuple(Vec<KeyValue>),
}

impl KeyValue {
    /// Converts an argument value, rejecting mutable collections and NaN.
    ///
    /// Values keep their type: `1`, `1.0` and `true` are different keys.
    pub fn from_arg(value: &ArgValue, position: &ArgPosition) -> MemoResult<Self> {
        match value {
            ArgValue::None => Ok(KeyValue::None),
            ArgValue::Bool(b) => Ok(KeyValue::Bool(*b)),
            ArgValue::Int(i) => Ok(KeyValue::Int(*i)),
            ArgValue::UInt(u) => Ok(match i64::try_from(*u) {
                Ok(i) => KeyValue::Int(i),
                Err(_) => KeyValue::UInt(*u),
            }),
            ArgValue::Float(f) if f.is_nan() => Err(MemoError::not_hashable(
                position.clone(),
                "NaN is not equal to itself",
            )),
            ArgValue::Float(f) => {
                let normalized = if *f == 0.0 { 0.0f64 } else { *f };
                Ok(KeyValue::Float(normalized.to_bits()))
            }
            ArgValue::Str(s) => Ok(KeyValue::Str(s.clone())),
            ArgValue::Tuple(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    Self::from_arg(item, &ArgPosition::Nested(Box::new(position.clone()), i))
                })
                .collect::<MemoResult<Vec<_>>>()
                .map(KeyValue::Tuple),
            ArgValue::List(_) | ArgValue::Map(_) => Err(MemoError::not_hashable(
                position.clone(),
                format!("{} is mutable", value.kind()),
            )),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::None => write!(f, "None"),
            KeyValue::Bool(b) => write!(f, "{}", b),
            KeyValue::Int(i) => write!(f, "{}", i),
            KeyValue::UInt(u) => write!(f, "{}", u),
            KeyValue::Float(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            KeyValue::Str(s) => write!(f, "{:?}", s),
            KeyValue::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Identity of one distinct argument combination.
///
/// Positional and named values are kept apart: `f(1)` and `f(n=1)` produce
/// different keys. Named values are ordered by name, so the order they were
/// supplied in does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    positional: Vec<KeyValue>,
    named: BTreeMap<String, KeyValue>,
}

impl CacheKey {
    /// Derives the key for a call.
    pub fn derive(args: &Args) -> MemoResult<Self> {
        let positional = args
            .positional_values()
            .iter()
            .enumerate()
            .map(|(i, value)| KeyValue::from_arg(value, &ArgPosition::Positional(i)))
            .collect::<MemoResult<Vec<_>>>()?;

        let mut named = BTreeMap::new();
        for (name, value) in args.named_values() {
            let key = KeyValue::from_arg(value, &ArgPosition::Named(name.clone()))?;
            named.insert(name.clone(), key);
        }

        Ok(Self { positional, named })
    }

    /// Positional part of the key.
    pub fn positional(&self) -> &[KeyValue] {
        &self.positional
    }

    /// Named part of the key, ordered by name.
    pub fn named(&self) -> &BTreeMap<String, KeyValue> {
        &self.named
    }

    /// Stable SHA256 hex digest of the key's canonical form.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        let mut first = true;
        for value in &self.positional {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
            first = false;
        }
        for (name, value) in &self.named {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{:?}={}", name, value)?;
            first = false;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(key: &CacheKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_same_args_same_key() {
        let key1 = CacheKey::derive(&Args::positional([2, 3])).unwrap();
        let key2 = CacheKey::derive(&Args::positional([2, 3])).unwrap();
        let key3 = CacheKey::derive(&Args::positional([3, 2])).unwrap();

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_named_order_is_irrelevant() {
        let key1 = CacheKey::derive(&Args::new().named("a", 1).named("b", 2)).unwrap();
        let key2 = CacheKey::derive(&Args::new().named("b", 2).named("a", 1)).unwrap();

        assert_eq!(key1, key2);
        assert_eq!(hash_of(&key1), hash_of(&key2));
        assert_eq!(key1.fingerprint(), key2.fingerprint());
    }

    #[test]
    fn test_positional_and_named_differ() {
        let positional = CacheKey::derive(&Args::new().arg(1)).unwrap();
        let named = CacheKey::derive(&Args::new().named("n", 1)).unwrap();

        assert_ne!(positional, named);
    }

    #[test]
    fn test_list_is_not_hashable() {
        let args = Args::new().arg(1).arg(ArgValue::list([1, 2]));
        let err = CacheKey::derive(&args).unwrap_err();

        match err {
            MemoError::ArgumentNotHashable { position, .. } => {
                assert_eq!(position, ArgPosition::Positional(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nested_unhashable_reports_path() {
        let args = Args::new().named("pair", ArgValue::Tuple(vec![1.into(), f64::NAN.into()]));
        let err = CacheKey::derive(&args).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Argument 'pair'[1] is not hashable: NaN is not equal to itself"
        );
    }

    #[test]
    fn test_negative_zero_matches_zero() {
        let key1 = CacheKey::derive(&Args::new().arg(0.0)).unwrap();
        let key2 = CacheKey::derive(&Args::new().arg(-0.0)).unwrap();

        assert_eq!(key1, key2);
    }

    #[test]
    fn test_display_is_unambiguous() {
        let int_key = CacheKey::derive(&Args::new().arg(1)).unwrap();
        let str_key = CacheKey::derive(&Args::new().arg("1")).unwrap();

        assert_eq!(int_key.to_string(), "(1)");
        assert_eq!(str_key.to_string(), "(\"1\")");
        assert_ne!(int_key.fingerprint(), str_key.fingerprint());

        let key = CacheKey::derive(
            &Args::new()
                .arg(ArgValue::tuple([7]))
                .named("z", true)
                .named("a", ArgValue::None),
        )
        .unwrap();
        assert_eq!(key.to_string(), "((7,), \"a\"=None, \"z\"=true)");
    }

    #[test]
    fn test_names_cannot_forge_other_keys() {
        let forged = CacheKey::derive(&Args::new().named("x=1, y", 2)).unwrap();
        let honest = CacheKey::derive(&Args::new().named("x", 1).named("y", 2)).unwrap();

        assert_ne!(forged, honest);
        assert_ne!(forged.to_string(), honest.to_string());
        assert_ne!(forged.fingerprint(), honest.fingerprint());
    }

    #[test]
    fn test_large_integers_stay_distinct() {
        let max = CacheKey::derive(&Args::new().arg(u64::MAX)).unwrap();
        let below = CacheKey::derive(&Args::new().arg(u64::MAX - 1)).unwrap();

        assert_ne!(max, below);
        assert_eq!(max.to_string(), "(18446744073709551615)");

        // Small unsigned values key like signed ones
        let small = CacheKey::derive(&Args::new().arg(ArgValue::UInt(5))).unwrap();
        assert_eq!(small, CacheKey::derive(&Args::new().arg(5)).unwrap());
    }

    #[test]
    fn test_values_keep_their_type() {
        let int_key = CacheKey::derive(&Args::new().arg(1)).unwrap();
        let float_key = CacheKey::derive(&Args::new().arg(1.0)).unwrap();
        let bool_key = CacheKey::derive(&Args::new().arg(true)).unwrap();

        assert_ne!(int_key, float_key);
        assert_ne!(int_key, bool_key);
        assert_ne!(float_key, bool_key);
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let key = CacheKey::derive(&Args::new()).unwrap();
        let fp = key.fingerprint();

        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
