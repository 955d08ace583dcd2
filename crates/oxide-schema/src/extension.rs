//! Extension hooks.
//!
//! An extension adds behaviour at named points of the apply and export
//! flows without replacing any host code. Every hook has a do-nothing
//! default, so an extension only implements the points it cares about.
//!
//! | Hook | Runs |
//! |------|------|
//! | [`register_options`](SchemaExtension::register_options) | once, at install time |
//! | [`before_create_table`](SchemaExtension::before_create_table) | before a table definition is built |
//! | [`render_column`](SchemaExtension::render_column) | for each column of a `CREATE TABLE` |
//! | [`before_add_column`](SchemaExtension::before_add_column) | before `ALTER TABLE ... ADD COLUMN` |
//! | [`column_dump_options`](SchemaExtension::column_dump_options) | for each exported `t.<type>` line |
//! | [`after_dump`](SchemaExtension::after_dump) | on the finished export text |

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::connection::Session;
use crate::error::Result;
use crate::introspect::CatalogColumn;
use crate::options::{OptionMap, OptionRegistry, OptionValue};
use crate::schema::ColumnDefinition;

/// State shared between the hooks of a single `CREATE TABLE`.
///
/// A context lives exactly as long as one table creation; nothing stashed
/// in it can leak into the next table.
#[derive(Debug)]
pub struct CreateContext {
    table: String,
    pending: HashMap<&'static str, OptionValue>,
}

impl CreateContext {
    /// Starts the context for `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            pending: HashMap::new(),
        }
    }

    /// The table being created.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Stores a value for a later hook.
    pub fn stash(&mut self, key: &'static str, value: impl Into<OptionValue>) {
        self.pending.insert(key, value.into());
    }

    /// Removes and returns a stashed value.
    pub fn take(&mut self, key: &str) -> Option<OptionValue> {
        self.pending.remove(key)
    }

    /// Returns a stashed value without removing it.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<&OptionValue> {
        self.pending.get(key)
    }
}

/// A set of hooks into the apply and export flows.
#[allow(unused_variables)]
pub trait SchemaExtension: Send + Sync {
    /// Unique name. Installing two extensions with the same name keeps
    /// the first.
    fn name(&self) -> &'static str;

    /// Contributes option keys to the host's validation.
    fn register_options(&self, registry: &mut OptionRegistry) {}

    /// Rewrites `create_table` options before the definition is built.
    ///
    /// Keys the host does not know must be removed or registered.
    fn before_create_table(
        &self,
        session: &mut Session,
        table: &str,
        options: &mut OptionMap,
        ctx: &mut CreateContext,
    ) -> Result<()> {
        Ok(())
    }

    /// Adjusts a column while its `CREATE TABLE` clause is rendered.
    /// Clauses pushed to `clauses` are appended to the column definition.
    fn render_column(
        &self,
        session: &mut Session,
        column: &mut ColumnDefinition,
        clauses: &mut Vec<String>,
        ctx: &mut CreateContext,
    ) -> Result<()> {
        Ok(())
    }

    /// Adjusts a column before it is added to an existing table and
    /// returns statements to run after the `ADD COLUMN`.
    fn before_add_column(
        &self,
        session: &mut Session,
        table: &str,
        column: &mut ColumnDefinition,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Adds options to an exported column line.
    fn column_dump_options(
        &self,
        session: &mut Session,
        table: &str,
        column: &CatalogColumn,
        options: &mut OptionMap,
    ) -> Result<()> {
        Ok(())
    }

    /// Post-processes the complete export text.
    fn after_dump(&self, session: &mut Session, schemafile: String) -> Result<String> {
        Ok(schemafile)
    }
}

/// Installed extensions plus the option keys they contributed.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Arc<dyn SchemaExtension>>,
    options: OptionRegistry,
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs an extension. Returns false if one with the same name was
    /// already installed.
    pub fn install(&mut self, extension: Arc<dyn SchemaExtension>) -> bool {
        let name = extension.name();
        if self.extensions.iter().any(|e| e.name() == name) {
            debug!(extension = name, "already installed");
            return false;
        }
        extension.register_options(&mut self.options);
        self.extensions.push(extension);
        debug!(extension = name, "installed");
        true
    }

    /// Installed extensions, in install order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SchemaExtension>> {
        self.extensions.iter()
    }

    /// The combined option-key registry.
    #[must_use]
    pub const fn options(&self) -> &OptionRegistry {
        &self.options
    }

    /// Number of installed extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Returns true if nothing is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.extensions.iter().map(|e| e.name()).collect();
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &names)
            .field("options", &self.options)
            .finish()
    }
}
