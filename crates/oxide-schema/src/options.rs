//! Option maps and the option-key registry.
//!
//! Table and column declarations carry their settings as ordered
//! `key: value` maps, exactly as they are written in a Schemafile. The host
//! validates those keys against its own builtin list plus whatever
//! extensions contributed to the [`OptionRegistry`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// A single option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionValue {
    /// `nil`.
    Nil,
    /// `true` / `false`.
    Bool(bool),
    /// Integer literal.
    Integer(i64),
    /// Double-quoted string.
    String(String),
    /// Symbol such as `:bigint`.
    Symbol(String),
    /// `[a, b]`.
    Array(Vec<OptionValue>),
    /// `{ key: value }`.
    Map(OptionMap),
}

impl OptionValue {
    /// Creates a symbol value.
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    /// Creates a string value.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Returns the boolean if this is `true`/`false`.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer literal.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the text of a string or symbol.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested map.
    #[must_use]
    pub const fn as_map(&self) -> Option<&OptionMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// `nil` and `false`.
    #[must_use]
    pub const fn is_falsy(&self) -> bool {
        matches!(self, Self::Nil | Self::Bool(false))
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u8> for OptionValue {
    fn from(value: u8) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<OptionMap> for OptionValue {
    fn from(value: OptionMap) -> Self {
        Self::Map(value)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        _ => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            Self::Symbol(s) => write!(f, ":{s}"),
            Self::Array(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Self::Map(map) if map.is_empty() => f.write_str("{}"),
            Self::Map(map) => write!(f, "{{ {map} }}"),
        }
    }
}

/// An insertion-ordered option map.
///
/// Equality ignores order: `{a: 1, b: 2}` equals `{b: 2, a: 1}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionMap {
    entries: Vec<(String, OptionValue)>,
}

impl OptionMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Gets a mutable value by key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut OptionValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns whether the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts a value. An existing key keeps its position.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Option<OptionValue> {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.get_mut(&key) {
            return Some(std::mem::replace(slot, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Removes a key and returns its value.
    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &OptionValue) -> bool) {
        self.entries.retain(|(k, v)| keep(k, v));
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for OptionMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl FromIterator<(String, OptionValue)> for OptionMap {
    fn from_iter<I: IntoIterator<Item = (String, OptionValue)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl fmt::Display for OptionMap {
    /// Renders `k: v, k2: v2` without surrounding braces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        f.write_str(&rendered.join(", "))
    }
}

/// Where an option key is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionScope {
    /// `create_table` options.
    Table,
    /// Column options, including the `id:` hash.
    Column,
}

/// Additional option keys contributed by extensions.
///
/// The host's key validation consults this registry on top of its builtin
/// key lists, so extensions never have to patch the validator itself.
#[derive(Debug, Clone, Default)]
pub struct OptionRegistry {
    allowed: BTreeSet<(OptionScope, String)>,
}

impl OptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `key` in `scope`. Returns false if it was already allowed.
    pub fn allow(&mut self, scope: OptionScope, key: impl Into<String>) -> bool {
        self.allowed.insert((scope, key.into()))
    }

    /// Returns whether an extension allowed `key` in `scope`.
    #[must_use]
    pub fn is_allowed(&self, scope: OptionScope, key: &str) -> bool {
        self.allowed.contains(&(scope, key.to_string()))
    }

    /// Rejects keys that are neither builtin nor registered.
    pub fn assert_valid_keys(
        &self,
        scope: OptionScope,
        options: &OptionMap,
        builtin: &[&str],
        context: &str,
    ) -> Result<()> {
        let unknown: Vec<String> = options
            .keys()
            .filter(|k| !builtin.contains(k) && !self.is_allowed(scope, k))
            .map(ToString::to_string)
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::UnknownOption {
                context: context.to_string(),
                keys: unknown,
            })
        }
    }
}
