//! Error types for schema apply/export.

use crate::connection::ConnectionError;

/// Errors that can occur while applying or exporting a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Database error while executing or introspecting.
    #[error("Database error: {0}")]
    Database(#[from] ConnectionError),

    /// IO error (reading/writing Schemafiles).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a Schemafile.
    #[error("Failed to parse Schemafile at line {line}: {message}")]
    Parse {
        /// 1-based line of the offending token.
        line: usize,
        /// Error message.
        message: String,
    },

    /// Option keys that neither the host nor any extension accepts.
    #[error("Unknown key(s) for {context}: {}", .keys.join(", "))]
    UnknownOption {
        /// Table or column the options belong to.
        context: String,
        /// The rejected keys.
        keys: Vec<String>,
    },

    /// An option has a value of the wrong shape.
    #[error("Invalid definition for {context}: {message}")]
    InvalidDefinition {
        /// Table or column the definition belongs to.
        context: String,
        /// Error message.
        message: String,
    },

    /// A catalog column type the dumper cannot express in the DSL.
    #[error("Unsupported column type '{column_type}' on {table}.{column}")]
    UnsupportedColumnType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Raw `COLUMN_TYPE` from the catalog.
        column_type: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error raised by an installed extension hook.
    #[error(transparent)]
    Extension(Box<dyn std::error::Error + Send + Sync>),
}

impl SchemaError {
    /// Builds an [`SchemaError::InvalidDefinition`].
    pub fn invalid(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Returns the extension error if this error came from a hook and has
    /// type `E`.
    #[must_use]
    pub fn extension<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Extension(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
