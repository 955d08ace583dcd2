//! Autodetector for schema changes.
//!
//! Compares the declarations exported from the database with the ones read
//! from a Schemafile and produces the operations that take the database to
//! the Schemafile. Both sides are normalized first so that spellings with
//! the same meaning (`id: :bigint` vs. no `id`, `null: true` vs. nothing)
//! do not show up as changes.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::operations::MigrationOperation;
use crate::options::{OptionMap, OptionValue};
use crate::schema::{ColumnDeclaration, TableDeclaration, COLUMN_KEYS, DEFAULT_STRING_LIMIT};

/// Options for the autodetector.
#[derive(Debug, Clone, Default)]
pub struct AutodetectorOptions {
    /// Never emit `DropTable`.
    pub skip_drop_table: bool,
}

impl AutodetectorOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables table drops.
    #[must_use]
    pub const fn with_skip_drop_table(mut self) -> Self {
        self.skip_drop_table = true;
        self
    }
}

/// The operations needed to bring a database in line with a Schemafile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDiff {
    /// Operations in execution order.
    pub operations: Vec<MigrationOperation>,
}

impl SchemaDiff {
    /// Returns true if nothing would be executed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.operations.iter().any(MigrationOperation::is_executable)
    }

    /// Renders the operations as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.operations {
            writeln!(f, "{}", op.description())?;
        }
        Ok(())
    }
}

/// Detects schema changes and generates operations.
#[derive(Debug, Default)]
pub struct Autodetector {
    options: AutodetectorOptions,
}

impl Autodetector {
    /// Creates a new autodetector with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new autodetector with custom options.
    #[must_use]
    pub const fn with_options(options: AutodetectorOptions) -> Self {
        Self { options }
    }

    /// Compares `current` (exported from the database) with `desired`
    /// (read from a Schemafile).
    #[must_use]
    pub fn diff(&self, current: &[TableDeclaration], desired: &[TableDeclaration]) -> SchemaDiff {
        let mut operations = Vec::new();

        let current_tables: HashMap<&str, &TableDeclaration> =
            current.iter().map(|t| (t.name.as_str(), t)).collect();
        let desired_names: BTreeSet<&str> = desired.iter().map(|t| t.name.as_str()).collect();

        // New and changed tables, in Schemafile order.
        for table in desired {
            match current_tables.get(table.name.as_str()) {
                None => operations.push(MigrationOperation::CreateTable(table.clone())),
                Some(existing) => operations.extend(self.diff_table(existing, table)),
            }
        }

        if !self.options.skip_drop_table {
            let mut dropped: Vec<&str> = current_tables
                .keys()
                .filter(|name| !desired_names.contains(*name))
                .copied()
                .collect();
            dropped.sort_unstable();
            operations.extend(dropped.into_iter().map(MigrationOperation::drop_table));
        }

        SchemaDiff { operations }
    }

    /// Compares two versions of one table.
    #[allow(clippy::unused_self)]
    fn diff_table(
        &self,
        from: &TableDeclaration,
        to: &TableDeclaration,
    ) -> Vec<MigrationOperation> {
        let mut operations = Vec::new();
        let table_name = &to.name;

        let from_options = normalize_table_options(&from.options);
        let to_options = normalize_table_options(&to.options);
        if from_options != to_options {
            operations.push(MigrationOperation::ChangeTableOptions {
                table: table_name.clone(),
                from: from_options,
                to: to_options,
            });
        }

        let from_cols: HashMap<&str, &ColumnDeclaration> =
            from.columns.iter().map(|c| (c.name.as_str(), c)).collect();
        let from_identity = implicit_identity(&from.options);
        let to_identity = implicit_identity(&to.options);

        for column in &to.columns {
            match from_cols.get(column.name.as_str()) {
                // Declared explicitly here, implicitly there: the id shape
                // is already covered by the table options.
                None if from_identity == Some(column.name.as_str()) => {}
                None => operations.push(MigrationOperation::add_column(table_name, column.clone())),
                Some(existing) if !columns_equal(existing, column) => {
                    operations.push(MigrationOperation::change_column(table_name, column.clone()));
                }
                Some(_) => {}
            }
        }

        for column in &from.columns {
            if to.get_column(&column.name).is_none() && to_identity != Some(column.name.as_str()) {
                operations.push(MigrationOperation::remove_column(table_name, &column.name));
            }
        }

        operations
    }
}

/// Name of the implicit identity column, unless `id: false`.
fn implicit_identity(options: &OptionMap) -> Option<&str> {
    match options.get("id") {
        Some(OptionValue::Bool(false)) => None,
        _ => Some(
            options
                .get("primary_key")
                .and_then(OptionValue::as_str)
                .unwrap_or("id"),
        ),
    }
}

fn columns_equal(a: &ColumnDeclaration, b: &ColumnDeclaration) -> bool {
    a.type_name == b.type_name
        && normalize_column_options(&a.type_name, &a.options)
            == normalize_column_options(&b.type_name, &b.options)
}

/// Drops table options that restate the defaults.
fn normalize_table_options(options: &OptionMap) -> OptionMap {
    let mut options = options.clone();
    if let Some(OptionValue::Map(id)) = options.get("id") {
        if id.len() == 1 {
            if let Some(t) = id.get("type").cloned() {
                options.insert("id", t);
            }
        }
    }
    options.retain(|key, value| match (key, value) {
        ("id", OptionValue::Bool(true)) => false,
        ("id", OptionValue::Symbol(t) | OptionValue::String(t)) => t != "bigint",
        ("primary_key", OptionValue::Symbol(n) | OptionValue::String(n)) => n != "id",
        ("options" | "comment", OptionValue::String(s)) => !s.trim().is_empty(),
        (_, OptionValue::Nil) => false,
        _ => true,
    });
    options
}

/// Drops column options that restate the defaults.
///
/// Only builtin keys take part: extension-owned column options cannot be
/// changed in place by `MODIFY COLUMN`.
fn normalize_column_options(type_name: &str, options: &OptionMap) -> OptionMap {
    let mut options = options.clone();
    options.retain(|key, value| match (key, value) {
        (key, _) if !COLUMN_KEYS.contains(&key) => false,
        ("null", OptionValue::Bool(true))
        | ("primary_key" | "auto_increment", OptionValue::Bool(false))
        | ("default", OptionValue::Nil) => false,
        ("limit", OptionValue::Integer(limit)) if type_name == "string" => {
            *limit != i64::from(DEFAULT_STRING_LIMIT)
        }
        _ => true,
    });
    options
}
