//! Error types for the AUTO_RANDOM extension.

use oxide_schema::SchemaError;

/// Errors raised while translating AUTO_RANDOM declarations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TidbError {
    /// The declaration cannot be expressed as valid AUTO_RANDOM DDL.
    #[error("AUTO_RANDOM constraint violated on {table}.{column}: {reason}")]
    ConstraintViolation {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// What is wrong.
        reason: String,
    },

    /// AUTO_RANDOM requested on a column type that cannot carry it.
    #[error("AUTO_RANDOM is not supported on {table}.{column} of type {sql_type}")]
    UnsupportedFeature {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Column type.
        sql_type: String,
    },
}

impl TidbError {
    /// Builds a [`TidbError::ConstraintViolation`].
    pub fn violation(
        table: impl Into<String>,
        column: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ConstraintViolation {
            table: table.into(),
            column: column.into(),
            reason: reason.into(),
        }
    }
}

impl From<TidbError> for SchemaError {
    fn from(err: TidbError) -> Self {
        Self::Extension(Box::new(err))
    }
}

/// Result type for extension operations.
pub type Result<T> = std::result::Result<T, TidbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_schema_error() {
        let err: SchemaError = TidbError::violation("users", "id", "primary_key: false").into();
        assert_eq!(
            err.to_string(),
            "AUTO_RANDOM constraint violated on users.id: primary_key: false"
        );
        assert!(matches!(
            err.extension::<TidbError>(),
            Some(TidbError::ConstraintViolation { table, .. }) if table == "users"
        ));
    }
}
