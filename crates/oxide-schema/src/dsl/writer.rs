//! Renders table declarations back into Schemafile text.

use std::fmt::Write as _;

use crate::options::OptionValue;
use crate::schema::TableDeclaration;

/// Header written at the top of every exported Schemafile.
pub const SCHEMAFILE_HEADER: &str = "# -*- mode: ruby -*-\n# vi: set ft=ruby :\n";

/// Renders one `create_table` block.
#[must_use]
pub fn write_table(table: &TableDeclaration) -> String {
    let mut out = format!("create_table {}", OptionValue::string(table.name.as_str()));
    if !table.options.is_empty() {
        let _ = write!(out, ", {}", table.options);
    }
    out.push_str(" do |t|\n");
    for column in &table.columns {
        let _ = write!(
            out,
            "  t.{} {}",
            column.type_name,
            OptionValue::string(column.name.as_str())
        );
        if !column.options.is_empty() {
            let _ = write!(out, ", {}", column.options);
        }
        out.push('\n');
    }
    out.push_str("end\n");
    out
}

/// Renders a whole Schemafile, tables separated by a blank line.
#[must_use]
pub fn write_schemafile(tables: &[TableDeclaration]) -> String {
    let mut out = String::from(SCHEMAFILE_HEADER);
    for table in tables {
        out.push('\n');
        out.push_str(&write_table(table));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse_schemafile;
    use crate::schema::ColumnDeclaration;

    #[test]
    fn test_write_table() {
        let table = TableDeclaration::new("users")
            .option("id", OptionValue::symbol("integer"))
            .option("options", OptionValue::string("ENGINE=InnoDB"))
            .column(ColumnDeclaration::new("name", "string").option("null", false));

        assert_eq!(
            write_table(&table),
            "create_table \"users\", id: :integer, options: \"ENGINE=InnoDB\" do |t|\n  t.string \"name\", null: false\nend\n"
        );
    }

    #[test]
    fn test_written_file_parses_back() {
        let tables = vec![
            TableDeclaration::new("a").column(ColumnDeclaration::new("x", "text")),
            TableDeclaration::new("b").option("id", false),
        ];
        let text = write_schemafile(&tables);
        assert!(text.starts_with(SCHEMAFILE_HEADER));
        assert!(text.contains("end\n\ncreate_table \"b\", id: false do |t|\nend\n"));
        assert_eq!(parse_schemafile(&text).unwrap(), tables);
    }
}
