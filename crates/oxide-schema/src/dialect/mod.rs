//! Database dialect implementations.
//!
//! A dialect turns resolved definitions into DDL text. Extension clauses
//! (one list per column) are produced by the client's hooks and appended
//! verbatim after the builtin column attributes.

mod mysql;

pub use mysql::MysqlDialect;

use crate::schema::{ColumnDefinition, SqlType, TableDefinition};

/// Trait for database-specific DDL generation.
pub trait SchemaDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Returns the auto-increment keyword for this dialect.
    fn auto_increment_keyword(&self) -> &'static str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String;

    /// Generates `CREATE TABLE`. `extra` holds the extension clauses of
    /// each column, index-aligned with `table.columns`.
    fn create_table_sql(&self, table: &TableDefinition, extra: &[Vec<String>]) -> String;

    /// Generates `DROP TABLE`.
    fn drop_table_sql(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(name))
    }

    /// Generates `ALTER TABLE ... ADD COLUMN`.
    fn add_column_sql(&self, table: &str, column: &ColumnDefinition, extra: &[String]) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column, extra)
        )
    }

    /// Generates `ALTER TABLE ... DROP COLUMN`.
    fn drop_column_sql(&self, table: &str, column_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column_name)
        )
    }

    /// Generates `ALTER TABLE ... MODIFY COLUMN`.
    fn modify_column_sql(
        &self,
        table: &str,
        column: &ColumnDefinition,
        extra: &[String],
    ) -> String {
        format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column, extra)
        )
    }

    /// Generates column definition SQL.
    fn column_definition(&self, column: &ColumnDefinition, extra: &[String]) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(&column.sql_type),
        ];

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default_sql) = column.default.to_sql() {
            parts.push(format!("DEFAULT {default_sql}"));
        }

        if column.auto_increment {
            parts.push(self.auto_increment_keyword().to_string());
        }

        if let Some(ref comment) = column.comment {
            parts.push(format!("COMMENT '{}'", comment.replace('\'', "''")));
        }

        parts.extend(extra.iter().cloned());
        parts.join(" ")
    }
}
