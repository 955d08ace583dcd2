//! Schema client.
//!
//! Ties a session, a dialect and the installed extensions together and
//! implements the three user-facing flows: export (`dump`), `diff` and
//! `apply`.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::autodetector::{Autodetector, AutodetectorOptions, SchemaDiff};
use crate::connection::{Connection, Session};
use crate::dialect::{MysqlDialect, SchemaDialect};
use crate::dsl::parse_schemafile;
use crate::dumper::Dumper;
use crate::error::Result;
use crate::extension::{CreateContext, ExtensionRegistry, SchemaExtension};
use crate::operations::MigrationOperation;
use crate::schema::{ColumnDeclaration, ColumnDefinition, TableDeclaration, TableDefinition};

/// Reads and parses a Schemafile from disk.
pub fn load_schemafile(path: impl AsRef<Path>) -> Result<Vec<TableDeclaration>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_schemafile(&text)
}

/// Applies and exports Schemafiles against one database session.
pub struct SchemaClient<D: SchemaDialect = MysqlDialect> {
    session: Session,
    dialect: D,
    extensions: ExtensionRegistry,
    autodetector: AutodetectorOptions,
    dry_run: bool,
}

impl SchemaClient<MysqlDialect> {
    /// Creates a client using the MySQL dialect.
    #[must_use]
    pub fn new(conn: Box<dyn Connection>) -> Self {
        Self::with_dialect(conn, MysqlDialect::new())
    }
}

impl<D: SchemaDialect> SchemaClient<D> {
    /// Creates a client with a custom dialect.
    #[must_use]
    pub fn with_dialect(conn: Box<dyn Connection>, dialect: D) -> Self {
        Self {
            session: Session::new(conn),
            dialect,
            extensions: ExtensionRegistry::new(),
            autodetector: AutodetectorOptions::new(),
            dry_run: false,
        }
    }

    /// Enables dry-run mode (statements are returned but not executed).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Never drop tables missing from the Schemafile.
    #[must_use]
    pub const fn skip_drop_table(mut self, enabled: bool) -> Self {
        self.autodetector.skip_drop_table = enabled;
        self
    }

    /// Installs an extension (builder style).
    #[must_use]
    pub fn with_extension(mut self, extension: impl SchemaExtension + 'static) -> Self {
        self.install(Arc::new(extension));
        self
    }

    /// Installs an extension. Returns false if it was already installed.
    pub fn install(&mut self, extension: Arc<dyn SchemaExtension>) -> bool {
        self.extensions.install(extension)
    }

    /// Installed extensions.
    #[must_use]
    pub const fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// The underlying session.
    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Returns the dialect.
    #[must_use]
    pub const fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Exports the database as Schemafile text.
    pub fn dump(&mut self) -> Result<String> {
        Dumper::new(&self.extensions).dump(&mut self.session)
    }

    /// Compares the database with a Schemafile.
    ///
    /// The database side is the exported text parsed back, so whatever the
    /// extensions inject on export takes part in the comparison.
    pub fn diff(&mut self, schemafile: &str) -> Result<SchemaDiff> {
        let desired = parse_schemafile(schemafile)?;
        let current = parse_schemafile(&self.dump()?)?;
        Ok(Autodetector::with_options(self.autodetector.clone()).diff(&current, &desired))
    }

    /// Brings the database in line with a Schemafile and returns the
    /// statements that were run (or would run, in dry-run mode).
    pub fn apply(&mut self, schemafile: &str) -> Result<Vec<String>> {
        let diff = self.diff(schemafile)?;
        self.apply_diff(&diff)
    }

    /// Executes the operations of a diff in order.
    pub fn apply_diff(&mut self, diff: &SchemaDiff) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for operation in &diff.operations {
            statements.extend(self.apply_operation(operation)?);
        }
        if statements.is_empty() {
            info!("No change");
        }
        Ok(statements)
    }

    fn apply_operation(&mut self, operation: &MigrationOperation) -> Result<Vec<String>> {
        if !operation.is_executable() {
            warn!(operation = %operation.description(), "Not applied");
            return Ok(Vec::new());
        }
        info!(operation = %operation.description(), dry_run = self.dry_run, "Applying");

        match operation {
            MigrationOperation::CreateTable(table) => self.create_table(table),
            MigrationOperation::DropTable { name } => {
                let sql = self.dialect.drop_table_sql(name);
                self.run(vec![sql])
            }
            MigrationOperation::AddColumn { table, column } => self.add_column(table, column),
            MigrationOperation::RemoveColumn { table, column_name } => {
                let sql = self.dialect.drop_column_sql(table, column_name);
                self.run(vec![sql])
            }
            MigrationOperation::ChangeColumn { table, column } => self.change_column(table, column),
            MigrationOperation::ChangeTableOptions { .. } => Ok(Vec::new()),
        }
    }

    /// Creates a table, running the `before_create_table` and
    /// `render_column` hooks.
    pub fn create_table(&mut self, decl: &TableDeclaration) -> Result<Vec<String>> {
        let mut options = decl.options.clone();
        let mut ctx = CreateContext::new(&decl.name);

        for extension in self.extensions.iter() {
            extension.before_create_table(&mut self.session, &decl.name, &mut options, &mut ctx)?;
        }

        let mut table = TableDefinition::from_declaration(
            &decl.name,
            &options,
            &decl.columns,
            self.extensions.options(),
        )?;

        let mut extra = Vec::with_capacity(table.columns.len());
        for column in &mut table.columns {
            let mut clauses = Vec::new();
            for extension in self.extensions.iter() {
                extension.render_column(&mut self.session, column, &mut clauses, &mut ctx)?;
            }
            extra.push(clauses);
        }

        let sql = self.dialect.create_table_sql(&table, &extra);
        self.run(vec![sql])
    }

    /// Adds a column, running the `before_add_column` hooks.
    pub fn add_column(&mut self, table: &str, decl: &ColumnDeclaration) -> Result<Vec<String>> {
        let mut column =
            ColumnDefinition::from_declaration(table, decl, self.extensions.options())?;

        let mut follow_ups = Vec::new();
        for extension in self.extensions.iter() {
            follow_ups.extend(extension.before_add_column(&mut self.session, table, &mut column)?);
        }

        let mut statements = vec![self.dialect.add_column_sql(table, &column, &[])];
        statements.extend(follow_ups);
        self.run(statements)
    }

    fn change_column(&mut self, table: &str, decl: &ColumnDeclaration) -> Result<Vec<String>> {
        let column = ColumnDefinition::from_declaration(table, decl, self.extensions.options())?;
        if !column.extensions.is_empty() {
            warn!(
                table = %table,
                column = %column.name,
                keys = %column.extensions,
                "Extension options are not applied when changing a column"
            );
        }
        let sql = self.dialect.modify_column_sql(table, &column, &[]);
        self.run(vec![sql])
    }

    fn run(&mut self, statements: Vec<String>) -> Result<Vec<String>> {
        for sql in &statements {
            if self.dry_run {
                debug!(sql = %sql, "dry run");
            } else {
                self.session.execute(sql)?;
            }
        }
        Ok(statements)
    }
}

impl<D: SchemaDialect> std::fmt::Debug for SchemaClient<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaClient")
            .field("dialect", &self.dialect.name())
            .field("extensions", &self.extensions)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}
