//! MySQL dialect, shared by MySQL-compatible servers such as TiDB.

use crate::schema::{SqlType, TableDefinition};

use super::SchemaDialect;

/// MySQL DDL dialect.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SchemaDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        sql_type.mysql_name()
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn create_table_sql(&self, table: &TableDefinition, extra: &[Vec<String>]) -> String {
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let clauses = extra.get(i).map_or(&[][..], Vec::as_slice);
                format!("  {}", self.column_definition(c, clauses))
            })
            .collect();

        if !table.primary_key.is_empty() {
            let quoted: Vec<String> = table
                .primary_key
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect();
            lines.push(format!("  PRIMARY KEY ({})", quoted.join(", ")));
        }

        let mut sql = format!(
            "CREATE TABLE {} (\n{}\n)",
            self.quote_identifier(&table.name),
            lines.join(",\n")
        );
        if let Some(ref options) = table.options {
            sql.push(' ');
            sql.push_str(options);
        }
        if let Some(ref comment) = table.comment {
            sql.push_str(&format!(" COMMENT='{}'", comment.replace('\'', "''")));
        }
        sql
    }
}
