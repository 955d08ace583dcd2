//! Schema representation types.
//!
//! A Schemafile is read into *declarations*: table and column names with
//! their raw option maps, exactly as written. Declarations are what the
//! autodetector diffs and what the writer renders. Right before SQL is
//! generated a declaration is resolved into a *definition* with typed
//! fields, and extension hooks get their chance to rewrite it.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::options::{OptionMap, OptionRegistry, OptionScope, OptionValue};

/// Builtin `create_table` option keys.
///
/// `default:` applies to the implicit identity column; `default: nil`
/// turns its auto-increment off.
pub const TABLE_KEYS: &[&str] = &["id", "primary_key", "default", "options", "comment"];

/// Builtin column option keys.
pub const COLUMN_KEYS: &[&str] = &[
    "null",
    "default",
    "limit",
    "precision",
    "scale",
    "primary_key",
    "auto_increment",
    "comment",
];

/// Keys the identity-column builder forwards from an `id: { ... }` hash.
///
/// Anything else in the hash is validated but not carried over to the
/// generated column.
pub const ID_KEYS: &[&str] = &["type", "limit", "default", "auto_increment", "comment"];

/// Default `string` length.
pub const DEFAULT_STRING_LIMIT: u32 = 255;

/// SQL data types supported by the Schemafile DSL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Variable-length character string.
    String(u32),
    /// Text.
    Text,
    /// Boolean (`tinyint(1)`).
    Boolean,
    /// Date and time.
    DateTime,
    /// Date only.
    Date,
    /// Decimal with precision and scale.
    Decimal(u8, u8),
    /// Floating point (single precision).
    Float,
    /// Floating point (double precision).
    Double,
    /// JSON data.
    Json,
}

impl SqlType {
    /// Resolves a DSL type name (`t.<type>`) using the `limit`,
    /// `precision` and `scale` options.
    pub fn from_declaration(type_name: &str, options: &OptionMap, context: &str) -> Result<Self> {
        let int_option = |key: &str| -> Result<Option<i64>> {
            match options.get(key) {
                None | Some(OptionValue::Nil) => Ok(None),
                Some(OptionValue::Integer(i)) => Ok(Some(*i)),
                Some(other) => Err(SchemaError::invalid(
                    context,
                    format!("`{key}` must be an integer, got {other}"),
                )),
            }
        };
        let narrow = |key: &str, value: i64| -> Result<u8> {
            u8::try_from(value).map_err(|_| {
                SchemaError::invalid(context, format!("`{key}` out of range: {value}"))
            })
        };

        let sql_type = match type_name {
            "integer" => Self::Integer,
            "bigint" => Self::BigInt,
            "smallint" => Self::SmallInt,
            "string" => {
                let limit = match int_option("limit")? {
                    Some(l) => u32::try_from(l).map_err(|_| {
                        SchemaError::invalid(context, format!("`limit` out of range: {l}"))
                    })?,
                    None => DEFAULT_STRING_LIMIT,
                };
                Self::String(limit)
            }
            "text" => Self::Text,
            "boolean" => Self::Boolean,
            "datetime" => Self::DateTime,
            "date" => Self::Date,
            "decimal" => {
                let precision = int_option("precision")?.unwrap_or(10);
                let scale = int_option("scale")?.unwrap_or(0);
                Self::Decimal(narrow("precision", precision)?, narrow("scale", scale)?)
            }
            "float" => Self::Float,
            "double" => Self::Double,
            "json" => Self::Json,
            other => {
                return Err(SchemaError::invalid(
                    context,
                    format!("unknown column type `{other}`"),
                ))
            }
        };
        Ok(sql_type)
    }

    /// Returns the DSL type name.
    #[must_use]
    pub const fn dsl_name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::SmallInt => "smallint",
            Self::String(_) => "string",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Date => "date",
            Self::Decimal(_, _) => "decimal",
            Self::Float => "float",
            Self::Double => "double",
            Self::Json => "json",
        }
    }

    /// Returns the non-default size options that go with [`dsl_name`](Self::dsl_name).
    #[must_use]
    pub fn dsl_options(&self) -> OptionMap {
        match self {
            Self::String(limit) if *limit != DEFAULT_STRING_LIMIT => {
                OptionMap::new().with("limit", i64::from(*limit))
            }
            Self::Decimal(precision, scale) => OptionMap::new()
                .with("precision", *precision)
                .with("scale", *scale),
            _ => OptionMap::new(),
        }
    }

    /// Returns the MySQL column type.
    #[must_use]
    pub fn mysql_name(&self) -> String {
        match self {
            Self::Integer => "int".to_string(),
            Self::BigInt => "bigint".to_string(),
            Self::SmallInt => "smallint".to_string(),
            Self::String(limit) => format!("varchar({limit})"),
            Self::Text => "text".to_string(),
            Self::Boolean => "tinyint(1)".to_string(),
            Self::DateTime => "datetime".to_string(),
            Self::Date => "date".to_string(),
            Self::Decimal(p, s) => format!("decimal({p},{s})"),
            Self::Float => "float".to_string(),
            Self::Double => "double".to_string(),
            Self::Json => "json".to_string(),
        }
    }

    /// Parses a catalog `COLUMN_TYPE` such as `bigint(20)` or
    /// `varchar(64)`.
    #[must_use]
    pub fn from_mysql(column_type: &str) -> Option<Self> {
        let column_type = column_type.trim().to_ascii_lowercase();
        let column_type = column_type
            .strip_suffix(" unsigned")
            .unwrap_or(&column_type);
        let (base, args) = match column_type.split_once('(') {
            Some((base, rest)) => (base, rest.strip_suffix(')').unwrap_or(rest)),
            None => (column_type, ""),
        };
        let mut args = args.split(',').map(str::trim).filter(|a| !a.is_empty());

        match base {
            "int" | "integer" | "mediumint" => Some(Self::Integer),
            "bigint" => Some(Self::BigInt),
            "smallint" => Some(Self::SmallInt),
            "tinyint" if args.next() == Some("1") => Some(Self::Boolean),
            "varchar" => args.next()?.parse().ok().map(Self::String),
            "text" | "mediumtext" | "longtext" => Some(Self::Text),
            "datetime" | "timestamp" => Some(Self::DateTime),
            "date" => Some(Self::Date),
            "decimal" | "numeric" => {
                let precision = args.next().map_or(Some(10), |p| p.parse().ok())?;
                let scale = args.next().map_or(Some(0), |s| s.parse().ok())?;
                Some(Self::Decimal(precision, scale))
            }
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// `integer` and `bigint`.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Integer | Self::BigInt)
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// No default value.
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// String default.
    String(String),
}

impl DefaultValue {
    /// Reads a `default:` option.
    pub fn from_option(value: Option<&OptionValue>, context: &str) -> Result<Self> {
        match value {
            None => Ok(Self::None),
            Some(OptionValue::Nil) => Ok(Self::Null),
            Some(OptionValue::Bool(b)) => Ok(Self::Bool(*b)),
            Some(OptionValue::Integer(i)) => Ok(Self::Integer(*i)),
            Some(OptionValue::String(s)) => Ok(Self::String(s.clone())),
            Some(other) => Err(SchemaError::invalid(
                context,
                format!("unsupported default {other}"),
            )),
        }
    }

    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Null => Some("NULL".to_string()),
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        }
    }
}

/// A column as written in a Schemafile: `t.<type_name> "<name>", <options>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDeclaration {
    /// Column name.
    pub name: String,
    /// DSL type name (`bigint`, `string`, ...).
    pub type_name: String,
    /// Column options.
    pub options: OptionMap,
}

impl ColumnDeclaration {
    /// Creates a column declaration without options.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            options: OptionMap::new(),
        }
    }

    /// Adds an option.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key, value);
        self
    }
}

/// A table as written in a Schemafile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDeclaration {
    /// Table name.
    pub name: String,
    /// `create_table` options.
    pub options: OptionMap,
    /// Column declarations, in order.
    pub columns: Vec<ColumnDeclaration>,
}

impl TableDeclaration {
    /// Creates an empty table declaration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: OptionMap::new(),
            columns: Vec::new(),
        }
    }

    /// Adds a table option.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key, value);
        self
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDeclaration) -> Self {
        self.columns.push(column);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDeclaration> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A resolved column, ready for SQL generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// SQL data type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Default value.
    pub default: DefaultValue,
    /// `primary_key:` as declared; `None` when not mentioned.
    pub primary_key: Option<bool>,
    /// Whether this column auto-increments.
    pub auto_increment: bool,
    /// Column comment.
    pub comment: Option<String>,
    /// Extension-owned options the host does not interpret.
    pub extensions: OptionMap,
}

impl ColumnDefinition {
    /// Creates a nullable column with no options.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: DefaultValue::None,
            primary_key: None,
            auto_increment: false,
            comment: None,
            extensions: OptionMap::new(),
        }
    }

    /// Resolves a column declaration, validating its option keys.
    pub fn from_declaration(
        table: &str,
        decl: &ColumnDeclaration,
        registry: &OptionRegistry,
    ) -> Result<Self> {
        let context = format!("{table}.{}", decl.name);
        registry.assert_valid_keys(OptionScope::Column, &decl.options, COLUMN_KEYS, &context)?;

        let sql_type = SqlType::from_declaration(&decl.type_name, &decl.options, &context)?;
        let mut column = Self::new(&decl.name, sql_type);
        column.primary_key = bool_option(&decl.options, "primary_key", &context)?;
        column.nullable = bool_option(&decl.options, "null", &context)?.unwrap_or(true)
            && !column.is_primary_key();
        column.default = DefaultValue::from_option(decl.options.get("default"), &context)?;
        column.auto_increment =
            bool_option(&decl.options, "auto_increment", &context)?.unwrap_or(false);
        column.comment = decl
            .options
            .get("comment")
            .and_then(OptionValue::as_str)
            .map(ToString::to_string);
        column.extensions = decl
            .options
            .iter()
            .filter(|(k, _)| !COLUMN_KEYS.contains(k))
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Ok(column)
    }

    /// Returns true if the column was declared `primary_key: true`.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.primary_key == Some(true)
    }
}

/// A resolved table, ready for SQL generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name.
    pub name: String,
    /// Columns, the identity column first when there is one.
    pub columns: Vec<ColumnDefinition>,
    /// Primary key column(s).
    pub primary_key: Vec<String>,
    /// Free-text table options (`ENGINE=InnoDB ...`).
    pub options: Option<String>,
    /// Table comment.
    pub comment: Option<String>,
}

impl TableDefinition {
    /// Resolves a table from its (possibly hook-rewritten) options and
    /// column declarations.
    pub fn from_declaration(
        name: &str,
        options: &OptionMap,
        columns: &[ColumnDeclaration],
        registry: &OptionRegistry,
    ) -> Result<Self> {
        registry.assert_valid_keys(OptionScope::Table, options, TABLE_KEYS, name)?;

        let mut table = Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            options: options
                .get("options")
                .and_then(OptionValue::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(ToString::to_string),
            comment: options
                .get("comment")
                .and_then(OptionValue::as_str)
                .map(ToString::to_string),
        };

        let pk_option = options.get("primary_key");
        match options.get("id") {
            Some(OptionValue::Bool(false)) => {
                if let Some(OptionValue::Array(names)) = pk_option {
                    table.primary_key = names
                        .iter()
                        .filter_map(OptionValue::as_str)
                        .map(ToString::to_string)
                        .collect();
                }
            }
            id => {
                let pk_name = pk_option.and_then(OptionValue::as_str).unwrap_or("id");
                let identity =
                    identity_column(name, pk_name, id, options.get("default"), registry)?;
                table.primary_key.push(identity.name.clone());
                table.columns.push(identity);
            }
        }

        for decl in columns {
            if table.columns.iter().any(|c| c.name == decl.name) {
                return Err(SchemaError::invalid(
                    name,
                    format!("column `{}` is defined twice", decl.name),
                ));
            }
            let column = ColumnDefinition::from_declaration(name, decl, registry)?;
            if column.is_primary_key() && !table.primary_key.contains(&column.name) {
                table.primary_key.push(column.name.clone());
            }
            table.columns.push(column);
        }

        Ok(table)
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Builds the implicit identity column from the `id:` option.
fn identity_column(
    table: &str,
    name: &str,
    id: Option<&OptionValue>,
    default: Option<&OptionValue>,
    registry: &OptionRegistry,
) -> Result<ColumnDefinition> {
    let context = format!("{table}.{name}");
    let id_options = match id {
        None | Some(OptionValue::Bool(true)) => OptionMap::new(),
        Some(OptionValue::Symbol(t) | OptionValue::String(t)) => {
            OptionMap::new().with("type", OptionValue::symbol(t.clone()))
        }
        Some(OptionValue::Map(map)) => {
            registry.assert_valid_keys(OptionScope::Column, map, ID_KEYS, &context)?;
            map.iter()
                .filter(|(k, _)| ID_KEYS.contains(k))
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect()
        }
        Some(other) => {
            return Err(SchemaError::invalid(
                table,
                format!("unsupported `id` option {other}"),
            ))
        }
    };

    let type_name = id_options.get("type").and_then(OptionValue::as_str).unwrap_or("bigint");
    let sql_type = SqlType::from_declaration(type_name, &id_options, &context)?;
    let mut column = ColumnDefinition::new(name, sql_type);
    column.nullable = false;
    column.primary_key = Some(true);
    let default = id_options.get("default").or(default);
    column.auto_increment = bool_option(&id_options, "auto_increment", &context)?
        .unwrap_or(!matches!(default, Some(OptionValue::Nil)));
    column.default = match default {
        Some(OptionValue::Nil) => DefaultValue::None,
        other => DefaultValue::from_option(other, &context)?,
    };
    column.comment = id_options
        .get("comment")
        .and_then(OptionValue::as_str)
        .map(ToString::to_string);
    Ok(column)
}

fn bool_option(options: &OptionMap, key: &str, context: &str) -> Result<Option<bool>> {
    match options.get(key) {
        None | Some(OptionValue::Nil) => Ok(None),
        Some(OptionValue::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(SchemaError::invalid(
            context,
            format!("`{key}` must be true or false, got {other}"),
        )),
    }
}
