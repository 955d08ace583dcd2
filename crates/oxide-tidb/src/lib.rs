//! TiDB `AUTO_RANDOM` support for `oxide-schema` Schemafiles.
//!
//! ```ruby
//! create_table "users", auto_random: 5, auto_random_base: 100000 do |t|
//!   t.string "name", null: false
//! end
//!
//! create_table "events", id: false do |t|
//!   t.bigint "id", primary_key: true, null: false, auto_random: 6
//! end
//! ```
//!
//! Installing [`AutoRandomExtension`] on a [`SchemaClient`] makes apply
//! generate `AUTO_RANDOM(<n>)` and `AUTO_RANDOM_BASE=<n>` on TiDB, and makes
//! export read them back so that apply/export cycles are stable. On any
//! other server the options are accepted and ignored.
//!
//! # Components
//!
//! - [`detector`] - is the server TiDB? (cached per session)
//! - [`extractor`] - AUTO_RANDOM as found in `SHOW CREATE TABLE`
//! - [`mutator`] - declarations to DDL on the apply path
//! - [`injector`] - table-level keys on the export path
//!
//! [`SchemaClient`]: oxide_schema::SchemaClient

pub mod detector;
pub mod error;
pub mod extension;
pub mod extractor;
pub mod injector;
pub mod mutator;
pub mod options;

pub use detector::supports_auto_random;
pub use error::{Result, TidbError};
pub use extension::{AutoRandomExtension, EXTENSION_NAME};
pub use extractor::{extract_column_attribute, extract_table_attributes, TableAttributes};
pub use options::{AutoRandom, ExtensionOptionSet, AUTO_RANDOM_BASE_KEY, AUTO_RANDOM_KEY};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::detector::supports_auto_random;
    pub use crate::error::TidbError;
    pub use crate::extension::AutoRandomExtension;
    pub use crate::options::AutoRandom;
    pub use oxide_schema::prelude::*;
}
