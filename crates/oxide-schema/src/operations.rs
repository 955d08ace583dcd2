//! Schema change operations.
//!
//! The autodetector produces these from a Schemafile/database comparison;
//! the client turns them into DDL.

use serde::Serialize;

use crate::options::OptionMap;
use crate::schema::{ColumnDeclaration, TableDeclaration};

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MigrationOperation {
    /// Create a new table.
    CreateTable(TableDeclaration),
    /// Drop an existing table.
    DropTable {
        /// Table name.
        name: String,
    },
    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// The new column.
        column: ColumnDeclaration,
    },
    /// Remove a column.
    RemoveColumn {
        /// Table name.
        table: String,
        /// Column name.
        column_name: String,
    },
    /// Redefine an existing column.
    ChangeColumn {
        /// Table name.
        table: String,
        /// The desired column.
        column: ColumnDeclaration,
    },
    /// Table-level options differ. Reported, never executed.
    ChangeTableOptions {
        /// Table name.
        table: String,
        /// Options currently in the database.
        from: OptionMap,
        /// Options in the Schemafile.
        to: OptionMap,
    },
}

impl MigrationOperation {
    /// Creates a drop table operation.
    pub fn drop_table(name: impl Into<String>) -> Self {
        Self::DropTable { name: name.into() }
    }

    /// Creates an add column operation.
    pub fn add_column(table: impl Into<String>, column: ColumnDeclaration) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    /// Creates a remove column operation.
    pub fn remove_column(table: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self::RemoveColumn {
            table: table.into(),
            column_name: column_name.into(),
        }
    }

    /// Creates a change column operation.
    pub fn change_column(table: impl Into<String>, column: ColumnDeclaration) -> Self {
        Self::ChangeColumn {
            table: table.into(),
            column,
        }
    }

    /// Returns false for operations that are only reported.
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        !matches!(self, Self::ChangeTableOptions { .. })
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable(table) => format!("Create table '{}'", table.name),
            Self::DropTable { name } => format!("Drop table '{name}'"),
            Self::AddColumn { table, column } => {
                format!("Add column '{}' to table '{table}'", column.name)
            }
            Self::RemoveColumn { table, column_name } => {
                format!("Remove column '{column_name}' from table '{table}'")
            }
            Self::ChangeColumn { table, column } => {
                format!("Change column '{}' in table '{table}'", column.name)
            }
            Self::ChangeTableOptions { table, from, to } => {
                format!("Table options of '{table}' differ: {{ {from} }} -> {{ {to} }}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionValue;

    #[test]
    fn test_description() {
        let op = MigrationOperation::add_column("users", ColumnDeclaration::new("age", "integer"));
        assert_eq!(op.description(), "Add column 'age' to table 'users'");
        assert!(op.is_executable());

        let op = MigrationOperation::ChangeTableOptions {
            table: "users".to_string(),
            from: OptionMap::new(),
            to: OptionMap::new().with("id", OptionValue::symbol("integer")),
        };
        assert_eq!(
            op.description(),
            "Table options of 'users' differ: {  } -> { id: :integer }"
        );
        assert!(!op.is_executable());
    }

    #[test]
    fn test_serialize_tagged() {
        let op = MigrationOperation::drop_table("logs");
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "drop_table");
        assert_eq!(json["name"], "logs");
    }
}
