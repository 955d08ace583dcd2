//! The `auto_random` and `auto_random_base` Schemafile options.

use std::fmt;

use oxide_schema::{OptionMap, OptionValue};

use crate::error::{Result, TidbError};

/// Identity-attribute key, on columns, the `id:` hash and tables.
pub const AUTO_RANDOM_KEY: &str = "auto_random";

/// Base-offset key, on tables.
pub const AUTO_RANDOM_BASE_KEY: &str = "auto_random_base";

/// An AUTO_RANDOM request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoRandom {
    /// `auto_random: true`, rendered as a bare `AUTO_RANDOM`.
    Default,
    /// `auto_random: <n>`, rendered as `AUTO_RANDOM(<n>)`.
    Bits(u8),
}

impl AutoRandom {
    /// Reads an option value. `false` and `nil` mean "not requested".
    pub fn from_option_value(
        value: &OptionValue,
        table: &str,
        column: &str,
    ) -> Result<Option<Self>> {
        match value {
            OptionValue::Nil | OptionValue::Bool(false) => Ok(None),
            OptionValue::Bool(true) => Ok(Some(Self::Default)),
            OptionValue::Integer(bits) => match u8::try_from(*bits) {
                Ok(bits) if bits > 0 => Ok(Some(Self::Bits(bits))),
                _ => Err(TidbError::violation(
                    table,
                    column,
                    format!("auto_random bit width must be a positive integer, got {bits}"),
                )),
            },
            other => Err(TidbError::violation(
                table,
                column,
                format!("auto_random must be true or a bit width, got {other}"),
            )),
        }
    }

    /// The column clause.
    #[must_use]
    pub fn to_sql(self) -> String {
        match self {
            Self::Default => "AUTO_RANDOM".to_string(),
            Self::Bits(bits) => format!("AUTO_RANDOM({bits})"),
        }
    }

    /// The Schemafile value.
    #[must_use]
    pub fn to_option_value(self) -> OptionValue {
        match self {
            Self::Default => OptionValue::Bool(true),
            Self::Bits(bits) => OptionValue::from(bits),
        }
    }

    /// The bit width, if one was given.
    #[must_use]
    pub const fn bits(self) -> Option<u8> {
        match self {
            Self::Default => None,
            Self::Bits(bits) => Some(bits),
        }
    }
}

impl fmt::Display for AutoRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// The extension keys taken out of one option map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtensionOptionSet {
    /// `auto_random:`.
    pub auto_random: Option<AutoRandom>,
    /// `auto_random_base:`.
    pub auto_random_base: Option<u64>,
}

impl ExtensionOptionSet {
    /// Removes both keys from `options` and parses them.
    ///
    /// The keys are removed even when parsing fails.
    pub fn take(options: &mut OptionMap, table: &str, column: &str) -> Result<Self> {
        let auto_random = options.remove(AUTO_RANDOM_KEY);
        let base = options.remove(AUTO_RANDOM_BASE_KEY);

        let auto_random = match auto_random {
            Some(value) => AutoRandom::from_option_value(&value, table, column)?,
            None => None,
        };
        let auto_random_base = match base {
            None | Some(OptionValue::Nil) => None,
            Some(OptionValue::Integer(n)) => Some(u64::try_from(n).map_err(|_| {
                TidbError::violation(
                    table,
                    column,
                    format!("auto_random_base must not be negative, got {n}"),
                )
            })?),
            Some(other) => {
                return Err(TidbError::violation(
                    table,
                    column,
                    format!("auto_random_base must be an integer, got {other}"),
                ))
            }
        };

        Ok(Self {
            auto_random,
            auto_random_base,
        })
    }

    /// Returns true if neither key was given.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.auto_random.is_none() && self.auto_random_base.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_option_value() {
        let parse = |v: OptionValue| AutoRandom::from_option_value(&v, "users", "id");
        assert_eq!(parse(OptionValue::Bool(true)).unwrap(), Some(AutoRandom::Default));
        assert_eq!(parse(OptionValue::Integer(5)).unwrap(), Some(AutoRandom::Bits(5)));
        assert_eq!(parse(OptionValue::Bool(false)).unwrap(), None);
        assert_eq!(parse(OptionValue::Nil).unwrap(), None);
        assert!(parse(OptionValue::Integer(0)).is_err());
        assert!(parse(OptionValue::Integer(300)).is_err());
        assert!(parse(OptionValue::string("5")).is_err());
    }

    #[test]
    fn test_to_sql() {
        assert_eq!(AutoRandom::Default.to_sql(), "AUTO_RANDOM");
        assert_eq!(AutoRandom::Bits(5).to_sql(), "AUTO_RANDOM(5)");
        assert_eq!(AutoRandom::Bits(5).to_option_value(), OptionValue::Integer(5));
    }

    #[test]
    fn test_take_strips_keys() {
        let mut options = OptionMap::new()
            .with("id", OptionValue::symbol("bigint"))
            .with(AUTO_RANDOM_KEY, 5)
            .with(AUTO_RANDOM_BASE_KEY, 100_000);

        let set = ExtensionOptionSet::take(&mut options, "users", "id").unwrap();
        assert_eq!(set.auto_random, Some(AutoRandom::Bits(5)));
        assert_eq!(set.auto_random_base, Some(100_000));
        assert_eq!(options.keys().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_take_strips_keys_on_error() {
        let mut options = OptionMap::new().with(AUTO_RANDOM_BASE_KEY, -1);
        assert!(ExtensionOptionSet::take(&mut options, "users", "id").is_err());
        assert!(options.is_empty());
    }
}
