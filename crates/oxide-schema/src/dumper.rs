//! Exports the live database as Schemafile text.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::connection::Session;
use crate::dsl::write_schemafile;
use crate::error::{Result, SchemaError};
use crate::extension::ExtensionRegistry;
use crate::introspect::CatalogColumn;
use crate::options::OptionValue;
use crate::schema::{ColumnDeclaration, SqlType, TableDeclaration};

static VERSION_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static AUTO_INCREMENT_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAUTO_INCREMENT\s*=\s*\d+").expect("valid regex"));

/// Builds Schemafile declarations from the catalog.
#[derive(Debug, Clone, Copy)]
pub struct Dumper<'a> {
    extensions: &'a ExtensionRegistry,
}

impl<'a> Dumper<'a> {
    /// Creates a dumper that runs the given extensions' export hooks.
    #[must_use]
    pub const fn new(extensions: &'a ExtensionRegistry) -> Self {
        Self { extensions }
    }

    /// Exports every table, sorted by name, then runs the `after_dump`
    /// hooks over the text.
    pub fn dump(&self, session: &mut Session) -> Result<String> {
        let tables = self.dump_tables(session)?;
        let mut text = write_schemafile(&tables);
        for extension in self.extensions.iter() {
            text = extension.after_dump(session, text)?;
        }
        Ok(text)
    }

    /// Exports every table as a declaration, before `after_dump`.
    pub fn dump_tables(&self, session: &mut Session) -> Result<Vec<TableDeclaration>> {
        let names = session.tables()?;
        debug!(count = names.len(), "dumping tables");
        names
            .iter()
            .map(|name| self.dump_table(session, name))
            .collect()
    }

    fn dump_table(&self, session: &mut Session, name: &str) -> Result<TableDeclaration> {
        let catalog = session.columns(name)?;
        let ddl = session.show_create_table(name).unwrap_or_else(|err| {
            debug!(
                table = %name,
                error = %err,
                "SHOW CREATE TABLE failed, exporting without table options"
            );
            None
        });
        let mut table = TableDeclaration::new(name);

        let pk: Vec<&CatalogColumn> = catalog.iter().filter(|c| c.is_primary_key()).collect();
        let implicit_id = match pk.as_slice() {
            [id] if id.name == "id" => SqlType::from_mysql(&id.column_type)
                .filter(SqlType::is_integer)
                .map(|sql_type| (*id, sql_type)),
            _ => None,
        };

        match (&implicit_id, pk.as_slice()) {
            (Some((id, sql_type)), _) => {
                let auto_increment = id.extra.to_ascii_lowercase().contains("auto_increment");
                if *sql_type != SqlType::BigInt || !auto_increment {
                    table.options.insert("id", OptionValue::symbol(sql_type.dsl_name()));
                }
                if !auto_increment {
                    table.options.insert("default", OptionValue::Nil);
                }
            }
            (None, []) | (None, [_]) => {
                table.options.insert("id", false);
            }
            (None, columns) => {
                table.options.insert("id", false);
                table.options.insert(
                    "primary_key",
                    OptionValue::Array(
                        columns
                            .iter()
                            .map(|c| OptionValue::string(c.name.as_str()))
                            .collect(),
                    ),
                );
            }
        }

        if let Some(options) = ddl.as_deref().and_then(table_options_from_ddl) {
            table.options.insert("options", OptionValue::String(options));
        }

        let single_pk = implicit_id.is_none() && pk.len() == 1;
        for column in &catalog {
            if implicit_id
                .as_ref()
                .is_some_and(|(id, _)| id.name == column.name)
            {
                continue;
            }
            let declaration = self.dump_column(session, name, column, single_pk)?;
            table.columns.push(declaration);
        }

        Ok(table)
    }

    fn dump_column(
        &self,
        session: &mut Session,
        table: &str,
        column: &CatalogColumn,
        single_pk: bool,
    ) -> Result<ColumnDeclaration> {
        let sql_type = SqlType::from_mysql(&column.column_type).ok_or_else(|| {
            SchemaError::UnsupportedColumnType {
                table: table.to_string(),
                column: column.name.clone(),
                column_type: column.column_type.clone(),
            }
        })?;

        let mut options = sql_type.dsl_options();
        if !column.nullable {
            options.insert("null", false);
        }
        if let Some(default) = column.default.as_deref() {
            options.insert("default", default_option(&sql_type, default));
        }
        if single_pk && column.is_primary_key() {
            options.insert("primary_key", true);
        }
        if column.extra.to_ascii_lowercase().contains("auto_increment") {
            options.insert("auto_increment", true);
        }

        for extension in self.extensions.iter() {
            extension.column_dump_options(session, table, column, &mut options)?;
        }

        Ok(ColumnDeclaration {
            name: column.name.clone(),
            type_name: sql_type.dsl_name().to_string(),
            options,
        })
    }
}

/// Reads a catalog `COLUMN_DEFAULT` back as a DSL value.
fn default_option(sql_type: &SqlType, raw: &str) -> OptionValue {
    match sql_type {
        SqlType::Boolean => OptionValue::Bool(raw != "0"),
        SqlType::Integer | SqlType::BigInt | SqlType::SmallInt => raw
            .parse::<i64>()
            .map_or_else(|_| OptionValue::string(raw), OptionValue::Integer),
        _ => OptionValue::string(raw),
    }
}

/// Returns the free-text table options after the column list of a
/// `CREATE TABLE` statement, without version comments and without the
/// volatile `AUTO_INCREMENT=<n>` counter. `None` if nothing remains.
#[must_use]
pub fn table_options_from_ddl(ddl: &str) -> Option<String> {
    let end = body_end(ddl)?;
    let tail = &ddl[end + 1..];
    let tail = VERSION_COMMENT.replace_all(tail, " ");
    let tail = AUTO_INCREMENT_OPTION.replace_all(&tail, " ");
    let options = tail.split_whitespace().collect::<Vec<_>>().join(" ");
    (!options.is_empty()).then_some(options)
}

/// Byte index of the parenthesis closing the first `(`, which in
/// `CREATE TABLE` text ends the column list.
pub(crate) fn body_end(ddl: &str) -> Option<usize> {
    let start = ddl.find('(')?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in ddl[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_options_from_ddl() {
        let ddl = "CREATE TABLE `users` (\n  `id` bigint(20) NOT NULL /*T![auto_rand] AUTO_RANDOM(5) */,\n  `note` varchar(10) DEFAULT ')',\n  PRIMARY KEY (`id`) /*T![clustered_index] CLUSTERED */\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 AUTO_INCREMENT=30001 /*T![auto_rand_base] AUTO_RANDOM_BASE=100000 */";
        assert_eq!(
            table_options_from_ddl(ddl).as_deref(),
            Some("ENGINE=InnoDB DEFAULT CHARSET=utf8mb4")
        );
    }

    #[test]
    fn test_table_options_empty() {
        assert_eq!(table_options_from_ddl("CREATE TABLE `t` (\n  `a` int\n)"), None);
        assert_eq!(table_options_from_ddl("not ddl"), None);
    }

    #[test]
    fn test_default_option() {
        assert_eq!(default_option(&SqlType::Integer, "0"), OptionValue::Integer(0));
        assert_eq!(default_option(&SqlType::Boolean, "1"), OptionValue::Bool(true));
        assert_eq!(
            default_option(&SqlType::String(255), "n/a"),
            OptionValue::string("n/a")
        );
    }
}
