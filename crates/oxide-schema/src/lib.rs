//! Declarative schema management for MySQL-compatible databases.
//!
//! `oxide-schema` keeps a database in line with a Ruby-style *Schemafile*:
//!
//! ```ruby
//! create_table "users", options: "ENGINE=InnoDB" do |t|
//!   t.string "name", null: false
//! end
//! ```
//!
//! - **Export** (`dump`) reads the catalog and writes a Schemafile.
//! - **Diff** compares a Schemafile with the exported one.
//! - **Apply** executes the DDL that closes the gap.
//!
//! # Architecture
//!
//! - **DSL** - Schemafile lexer, parser and writer
//! - **Schema** - Declarations (as written) and definitions (resolved)
//! - **Autodetector** - Diffs declarations into operations
//! - **Dialect** - MySQL DDL generation
//! - **Dumper** - Catalog introspection into declarations
//! - **Extensions** - Named hook points plus an option-key registry, so
//!   vendor features can be added without touching the host code
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_schema::prelude::*;
//!
//! let conn = BlockingMySqlConnection::connect("mysql://root@localhost/app")?;
//! let mut client = SchemaClient::new(Box::new(conn));
//! for sql in client.apply(&std::fs::read_to_string("Schemafile")?)? {
//!     println!("{sql};");
//! }
//! ```

pub mod autodetector;
pub mod client;
pub mod connection;
pub mod dialect;
pub mod dsl;
pub mod dumper;
pub mod error;
pub mod extension;
pub mod introspect;
pub mod operations;
pub mod options;
pub mod schema;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use autodetector::{Autodetector, AutodetectorOptions, SchemaDiff};
pub use client::{load_schemafile, SchemaClient};
pub use connection::{BlockingMySqlConnection, Connection, ConnectionError, Row, Session};
pub use dialect::{MysqlDialect, SchemaDialect};
pub use dsl::{parse_schemafile, write_schemafile};
pub use dumper::{table_options_from_ddl, Dumper};
pub use error::{Result, SchemaError};
pub use extension::{CreateContext, ExtensionRegistry, SchemaExtension};
pub use introspect::CatalogColumn;
pub use operations::MigrationOperation;
pub use options::{OptionMap, OptionRegistry, OptionScope, OptionValue};
pub use schema::{
    ColumnDeclaration, ColumnDefinition, DefaultValue, SqlType, TableDeclaration, TableDefinition,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::autodetector::{Autodetector, SchemaDiff};
    pub use crate::client::SchemaClient;
    pub use crate::connection::{BlockingMySqlConnection, Connection, Session};
    pub use crate::error::{Result, SchemaError};
    pub use crate::extension::{CreateContext, SchemaExtension};
    pub use crate::operations::MigrationOperation;
    pub use crate::options::{OptionMap, OptionScope, OptionValue};
    pub use crate::schema::{ColumnDeclaration, TableDeclaration};
}
