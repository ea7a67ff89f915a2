//! Call arguments for argument-keyed memoization.
//!
//! `Args` carries an ordered list of positional values and a set of named
//! values. Named values keep the order they were supplied in, but that order
//! never influences the derived cache key.

use serde_json::Value;

/// A single argument value.
///
/// `List` and `Map` model mutable collections: they can be passed to a
/// computation but cannot take part in a cache key.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Absent value.
    None,
    Bool(bool),
    Int(i64),
    /// Unsigned integer. Only needed above `i64::MAX`; smaller values key
    /// the same as `Int`.
    UInt(u64),
    Float(f64),
    Str(String),
    /// Immutable sequence; hashable when every element is.
    Tuple(Vec<ArgValue>),
    /// Mutable sequence; never hashable.
    List(Vec<ArgValue>),
    /// Mutable mapping; never hashable.
    Map(Vec<(String, ArgValue)>),
}

impl ArgValue {
    /// Builds a tuple value.
    pub fn tuple<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ArgValue>,
    {
        ArgValue::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Builds a list value.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ArgValue>,
    {
        ArgValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Converts a JSON value.
    ///
    /// Arrays become lists and objects become maps, matching what a JSON
    /// decoder hands to a computation.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ArgValue::None,
            Value::Bool(b) => ArgValue::Bool(*b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => ArgValue::Int(i),
                (None, Some(u)) => ArgValue::UInt(u),
                // Not an integer, so serde_json holds it as an f64
                _ => n.as_f64().map_or(ArgValue::None, ArgValue::Float),
            },
            Value::String(s) => ArgValue::Str(s.clone()),
            Value::Array(items) => ArgValue::List(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => ArgValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Returns the integer, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            ArgValue::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ArgValue::None => "none",
            ArgValue::Bool(_) => "bool",
            ArgValue::Int(_) | ArgValue::UInt(_) => "int",
            ArgValue::Float(_) => "float",
            ArgValue::Str(_) => "str",
            ArgValue::Tuple(_) => "tuple",
            ArgValue::List(_) => "list",
            ArgValue::Map(_) => "map",
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        ArgValue::Int(value.into())
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::Int(value.into())
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => ArgValue::Int(i),
            Err(_) => ArgValue::UInt(value),
        }
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Float(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Str(value)
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ArgValue::None)
    }
}

/// Positional and named arguments of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<ArgValue>,
    named: Vec<(String, ArgValue)>,
}

impl Args {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates arguments from positional values only.
    pub fn positional<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ArgValue>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: Vec::new(),
        }
    }

    /// Appends a positional value.
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a named value, replacing an earlier one with the same name.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.named.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.named.push((name, value)),
        }
        self
    }

    /// Positional values, in call order.
    pub fn positional_values(&self) -> &[ArgValue] {
        &self.positional
    }

    /// Named values, in the order they were supplied.
    pub fn named_values(&self) -> &[(String, ArgValue)] {
        &self.named
    }

    /// Looks up a positional value.
    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.positional.get(index)
    }

    /// Looks up a named value.
    pub fn get_named(&self, name: &str) -> Option<&ArgValue> {
        self.named.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Total number of arguments.
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// True when no arguments were given.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
