//! The AUTO_RANDOM extension, wired into the host's hook points.

use oxide_schema::{
    CatalogColumn, ColumnDefinition, CreateContext, OptionMap, OptionRegistry, OptionScope,
    SchemaExtension, Session,
};
use tracing::debug;

use crate::detector::supports_auto_random;
use crate::extractor::extract_column_attribute;
use crate::injector::inject;
use crate::mutator::{prepare_add_column, prepare_create_table, render_column};
use crate::options::{AUTO_RANDOM_BASE_KEY, AUTO_RANDOM_KEY};

/// Name the extension is installed under.
pub const EXTENSION_NAME: &str = "tidb.auto_random";

/// TiDB `AUTO_RANDOM` / `AUTO_RANDOM_BASE` support.
///
/// ```rust,ignore
/// let client = SchemaClient::new(conn).with_extension(AutoRandomExtension::new());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoRandomExtension;

impl AutoRandomExtension {
    /// Creates the extension.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SchemaExtension for AutoRandomExtension {
    fn name(&self) -> &'static str {
        EXTENSION_NAME
    }

    fn register_options(&self, registry: &mut OptionRegistry) {
        registry.allow(OptionScope::Column, AUTO_RANDOM_KEY);
        registry.allow(OptionScope::Table, AUTO_RANDOM_KEY);
        registry.allow(OptionScope::Table, AUTO_RANDOM_BASE_KEY);
    }

    fn before_create_table(
        &self,
        session: &mut Session,
        table: &str,
        options: &mut OptionMap,
        ctx: &mut CreateContext,
    ) -> oxide_schema::Result<()> {
        Ok(prepare_create_table(session, table, options, ctx)?)
    }

    fn render_column(
        &self,
        session: &mut Session,
        column: &mut ColumnDefinition,
        clauses: &mut Vec<String>,
        ctx: &mut CreateContext,
    ) -> oxide_schema::Result<()> {
        Ok(render_column(session, column, clauses, ctx)?)
    }

    fn before_add_column(
        &self,
        session: &mut Session,
        table: &str,
        column: &mut ColumnDefinition,
    ) -> oxide_schema::Result<Vec<String>> {
        Ok(prepare_add_column(session, table, column)?)
    }

    fn column_dump_options(
        &self,
        session: &mut Session,
        table: &str,
        column: &CatalogColumn,
        options: &mut OptionMap,
    ) -> oxide_schema::Result<()> {
        // TiDB only allows AUTO_RANDOM on a primary key column.
        if !column.is_primary_key() || !supports_auto_random(session) {
            return Ok(());
        }
        if let Some(attribute) = extract_column_attribute(session, table, &column.name) {
            debug!(table = %table, column = %column.name, %attribute, "exporting auto_random");
            options.insert(AUTO_RANDOM_KEY, attribute.to_option_value());
        }
        Ok(())
    }

    fn after_dump(
        &self,
        session: &mut Session,
        schemafile: String,
    ) -> oxide_schema::Result<String> {
        if !supports_auto_random(session) {
            return Ok(schemafile);
        }
        Ok(inject(session, schemafile))
    }
}
