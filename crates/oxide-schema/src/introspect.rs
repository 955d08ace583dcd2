//! Catalog queries used by the dumper and by extensions.

use serde::Serialize;

use crate::connection::{ConnectionError, Session};

/// One row of `information_schema.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogColumn {
    /// `COLUMN_NAME`.
    pub name: String,
    /// `COLUMN_TYPE`, e.g. `bigint(20)`.
    pub column_type: String,
    /// `IS_NULLABLE = 'YES'`.
    pub nullable: bool,
    /// `COLUMN_DEFAULT`.
    pub default: Option<String>,
    /// `COLUMN_KEY` (`PRI`, `UNI`, `MUL` or empty).
    pub key: String,
    /// `EXTRA`, e.g. `auto_increment` or `auto_random(5)`.
    pub extra: String,
}

impl CatalogColumn {
    /// Returns true if the column is part of the primary key.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.key.eq_ignore_ascii_case("PRI")
    }
}

impl Session {
    /// Lists base tables of the current database, sorted by name.
    pub fn tables(&mut self) -> Result<Vec<String>, ConnectionError> {
        let mut tables: Vec<String> = self
            .select_rows("SHOW TABLES")?
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect();
        tables.sort();
        Ok(tables)
    }

    /// Returns the `SHOW CREATE TABLE` text, or `None` if the server
    /// returned nothing usable.
    pub fn show_create_table(&mut self, table: &str) -> Result<Option<String>, ConnectionError> {
        let sql = format!("SHOW CREATE TABLE {}", Self::quote_identifier(table));
        let rows = self.select_rows(&sql)?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().nth(1).flatten())
            .filter(|ddl| !ddl.trim().is_empty()))
    }

    /// Lists the columns of `table` in ordinal order.
    pub fn columns(&mut self, table: &str) -> Result<Vec<CatalogColumn>, ConnectionError> {
        let sql = format!(
            "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT, COLUMN_KEY, EXTRA \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {} \
             ORDER BY ORDINAL_POSITION",
            Self::quote(table)
        );
        self.select_rows(&sql)?
            .into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                let mut next = || cells.next().flatten();
                let name = next().ok_or_else(|| {
                    ConnectionError::new(format!("catalog row for `{table}` has no column name"))
                })?;
                Ok(CatalogColumn {
                    name,
                    column_type: next().unwrap_or_default(),
                    nullable: next().is_some_and(|v| v.eq_ignore_ascii_case("YES")),
                    default: next(),
                    key: next().unwrap_or_default(),
                    extra: next().unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Lists the primary key column names of `table`.
    pub fn primary_keys(&mut self, table: &str) -> Result<Vec<String>, ConnectionError> {
        let sql = format!(
            "SELECT COLUMN_NAME FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {} AND COLUMN_KEY = 'PRI' \
             ORDER BY ORDINAL_POSITION",
            Self::quote(table)
        );
        Ok(self
            .select_rows(&sql)?
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .collect())
    }
}
