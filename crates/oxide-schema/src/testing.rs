//! In-memory MySQL-like database for tests.
//!
//! [`MemoryDatabase`] understands the DDL that [`MysqlDialect`] emits and
//! answers the catalog queries the client and the extensions issue:
//! `SHOW TABLES`, `SHOW CREATE TABLE`, `information_schema.COLUMNS`,
//! `SELECT VERSION()`, `SELECT @@<variable>` and `SHOW VARIABLES LIKE`.
//! Handles are cheap clones over shared state, so a test can keep one to
//! inspect what a client executed.
//!
//! [`MysqlDialect`]: crate::dialect::MysqlDialect

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use regex::Regex;

use crate::connection::{Connection, ConnectionError, Row};
use crate::dumper::body_end;

type Rewrite = Arc<dyn Fn(&str) -> String + Send + Sync>;

static CREATE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*CREATE\s+TABLE\s+`([^`]+)`\s*\(").expect("valid regex"));
static DROP_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*DROP\s+TABLE\s+`([^`]+)`\s*$").expect("valid regex"));
static ALTER_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*ALTER\s+TABLE\s+`([^`]+)`\s+(ADD|DROP|MODIFY)\s+COLUMN\s+(.*?)\s*$")
        .expect("valid regex")
});
static SHOW_TABLES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SHOW\s+TABLES\s*$").expect("valid regex"));
static SHOW_CREATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*SHOW\s+CREATE\s+TABLE\s+`([^`]+)`\s*$").expect("valid regex")
});
static SELECT_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\s+@@(\w+)\s*$").expect("valid regex"));
static SELECT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\s+VERSION\(\)\s*$").expect("valid regex"));
static SHOW_VARIABLES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*SHOW\s+(?:GLOBAL\s+|SESSION\s+)?VARIABLES\s+LIKE\s+'([^']*)'\s*$")
        .expect("valid regex")
});
static CATALOG_COLUMNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*SELECT\s+(.*?)\s+FROM\s+information_schema\.COLUMNS\s+WHERE\s+(.*?)\s*(?:ORDER\s+BY\s+.*)?$",
    )
    .expect("valid regex")
});
static CATALOG_FILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(TABLE_NAME|COLUMN_NAME|COLUMN_KEY)\s*=\s*'((?:[^'\\]|\\.)*)'")
        .expect("valid regex")
});

#[derive(Debug, Clone, Default)]
struct MemColumn {
    name: String,
    column_type: String,
    not_null: bool,
    default: Option<String>,
    auto_increment: bool,
    comment: Option<String>,
    /// Clauses the table keeps verbatim, e.g. `AUTO_RANDOM(5)`.
    clauses: Vec<String>,
}

impl MemColumn {
    fn extra(&self) -> String {
        let mut extra = Vec::new();
        if self.auto_increment {
            extra.push("auto_increment".to_string());
        }
        extra.extend(self.clauses.iter().map(|c| c.to_ascii_lowercase()));
        extra.join(" ")
    }

    fn render(&self) -> String {
        let mut parts = vec![format!("`{}`", self.name), self.column_type.clone()];
        if self.not_null {
            parts.push("NOT NULL".to_string());
        }
        match &self.default {
            Some(default) => parts.push(format!("DEFAULT '{}'", default.replace('\'', "''"))),
            None if !self.not_null => parts.push("DEFAULT NULL".to_string()),
            None => {}
        }
        if self.auto_increment {
            parts.push("AUTO_INCREMENT".to_string());
        }
        parts.extend(self.clauses.iter().cloned());
        if let Some(comment) = &self.comment {
            parts.push(format!("COMMENT '{}'", comment.replace('\'', "''")));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Default)]
struct MemTable {
    columns: Vec<MemColumn>,
    primary_key: Vec<String>,
    options: String,
}

impl MemTable {
    fn render(&self, name: &str) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("  {}", c.render()))
            .collect();
        if !self.primary_key.is_empty() {
            let quoted: Vec<String> = self.primary_key.iter().map(|c| format!("`{c}`")).collect();
            lines.push(format!("  PRIMARY KEY ({})", quoted.join(",")));
        }
        let mut ddl = format!("CREATE TABLE `{name}` (\n{}\n)", lines.join(",\n"));
        if !self.options.is_empty() {
            ddl.push(' ');
            ddl.push_str(&self.options);
        }
        ddl
    }

    fn set_primary_key(&mut self, columns: Vec<String>) {
        for column in &mut self.columns {
            if columns.contains(&column.name) {
                column.not_null = true;
            }
        }
        self.primary_key = columns;
    }
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, MemTable>,
    version: String,
    variables: BTreeMap<String, String>,
    failing: Vec<String>,
    empty_show_create: bool,
    rewrite: Option<Rewrite>,
    executed: Vec<String>,
    queries: Vec<String>,
}

impl State {
    fn variable(&self, name: &str) -> Option<String> {
        if name == "version" {
            Some(self.version.clone())
        } else {
            self.variables.get(name).cloned()
        }
    }

    /// `SHOW CREATE TABLE` text after the rewrite.
    fn create_text(&self, table: &str) -> Option<String> {
        let ddl = self.tables.get(table)?.render(table);
        Some(match &self.rewrite {
            Some(rewrite) => rewrite(&ddl),
            None => ddl,
        })
    }
}

/// A shared in-memory database. Clones see the same state.
#[derive(Clone)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (tables, version) = {
            let state = self.lock();
            (state.tables.keys().cloned().collect::<Vec<_>>(), state.version.clone())
        };
        f.debug_struct("MemoryDatabase")
            .field("tables", &tables)
            .field("version", &version)
            .finish_non_exhaustive()
    }
}

impl MemoryDatabase {
    /// Creates an empty database that reports a plain MySQL version.
    #[must_use]
    pub fn new() -> Self {
        let state = State {
            version: "8.0.36".to_string(),
            ..State::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the value returned by `SELECT VERSION()`.
    #[must_use]
    pub fn with_version(self, version: impl Into<String>) -> Self {
        self.lock().version = version.into();
        self
    }

    /// Defines a system variable, readable through `SELECT @@name` and
    /// `SHOW VARIABLES LIKE 'name'`.
    #[must_use]
    pub fn with_variable(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.lock().variables.insert(name.into(), value.into());
        self
    }

    /// Makes every statement containing `pattern` fail.
    #[must_use]
    pub fn failing_on(self, pattern: impl Into<String>) -> Self {
        self.lock().failing.push(pattern.into());
        self
    }

    /// Makes `SHOW CREATE TABLE` return no rows.
    #[must_use]
    pub fn without_show_create(self) -> Self {
        self.lock().empty_show_create = true;
        self
    }

    /// Post-processes every `SHOW CREATE TABLE` result.
    #[must_use]
    pub fn with_show_create_rewrite(
        self,
        rewrite: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.lock().rewrite = Some(Arc::new(rewrite));
        self
    }

    /// A new connection to this database.
    #[must_use]
    pub fn connection(&self) -> Box<dyn Connection> {
        Box::new(self.clone())
    }

    /// Statements run through [`Connection::execute`], in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Queries run through [`Connection::select_rows`], in order.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.lock().queries.clone()
    }

    /// Forgets the executed statements and queries.
    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.executed.clear();
        state.queries.clear();
    }

    /// Table names, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.lock().tables.keys().cloned().collect()
    }

    /// The `SHOW CREATE TABLE` text of `table`, after any rewrite.
    #[must_use]
    pub fn show_create_table(&self, table: &str) -> Option<String> {
        self.lock().create_text(table)
    }

    fn check_failing(state: &State, sql: &str) -> Result<(), ConnectionError> {
        match state.failing.iter().find(|p| sql.contains(p.as_str())) {
            Some(pattern) => Err(ConnectionError::new(format!("injected failure on `{pattern}`"))),
            None => Ok(()),
        }
    }

    fn run_ddl(state: &mut State, sql: &str) -> Result<(), ConnectionError> {
        if let Some(caps) = CREATE_TABLE.captures(sql) {
            let name = caps[1].to_string();
            if state.tables.contains_key(&name) {
                return Err(ConnectionError::new(format!("Table '{name}' already exists")));
            }
            let table = parse_create_table(sql)?;
            state.tables.insert(name, table);
            return Ok(());
        }

        if let Some(caps) = DROP_TABLE.captures(sql) {
            return state
                .tables
                .remove(&caps[1])
                .map(|_| ())
                .ok_or_else(|| unknown_table(&caps[1]));
        }

        if let Some(caps) = ALTER_COLUMN.captures(sql) {
            let table = state
                .tables
                .get_mut(&caps[1])
                .ok_or_else(|| unknown_table(&caps[1]))?;
            let definition = &caps[3];
            return match caps[2].to_ascii_uppercase().as_str() {
                "ADD" => {
                    let (column, primary_key) = parse_column(definition)?;
                    if table.columns.iter().any(|c| c.name == column.name) {
                        return Err(ConnectionError::new(format!(
                            "Duplicate column name '{}'",
                            column.name
                        )));
                    }
                    let name = column.name.clone();
                    table.columns.push(column);
                    if primary_key {
                        table.set_primary_key(vec![name]);
                    }
                    Ok(())
                }
                "DROP" => {
                    let name = definition.trim().trim_matches('`');
                    let before = table.columns.len();
                    table.columns.retain(|c| c.name != name);
                    if table.columns.len() == before {
                        return Err(ConnectionError::new(format!("Unknown column '{name}'")));
                    }
                    table.primary_key.retain(|c| c != name);
                    Ok(())
                }
                _ => {
                    let (column, primary_key) = parse_column(definition)?;
                    let slot = table
                        .columns
                        .iter_mut()
                        .find(|c| c.name == column.name)
                        .ok_or_else(|| {
                            ConnectionError::new(format!("Unknown column '{}'", column.name))
                        })?;
                    let name = column.name.clone();
                    *slot = column;
                    if primary_key {
                        if !table.primary_key.is_empty() && table.primary_key != [name.clone()] {
                            return Err(ConnectionError::new("Multiple primary key defined"));
                        }
                        table.set_primary_key(vec![name]);
                    }
                    Ok(())
                }
            };
        }

        Err(ConnectionError::new(format!("unsupported statement: {sql}")))
    }

    fn run_query(state: &State, sql: &str) -> Result<Vec<Row>, ConnectionError> {
        if SHOW_TABLES.is_match(sql) {
            return Ok(state.tables.keys().map(|t| vec![Some(t.clone())]).collect());
        }

        if let Some(caps) = SHOW_CREATE.captures(sql) {
            let name = &caps[1];
            let ddl = state.create_text(name).ok_or_else(|| unknown_table(name))?;
            if state.empty_show_create {
                return Ok(Vec::new());
            }
            return Ok(vec![vec![Some(name.to_string()), Some(ddl)]]);
        }

        if SELECT_VERSION.is_match(sql) {
            return Ok(vec![vec![Some(state.version.clone())]]);
        }

        if let Some(caps) = SELECT_VARIABLE.captures(sql) {
            let name = caps[1].to_ascii_lowercase();
            return state.variable(&name).map(|v| vec![vec![Some(v)]]).ok_or_else(|| {
                ConnectionError::new(format!("Unknown system variable '{name}'"))
            });
        }

        if let Some(caps) = SHOW_VARIABLES.captures(sql) {
            let name = caps[1].to_ascii_lowercase();
            return Ok(state
                .variable(&name)
                .map(|v| vec![vec![Some(name), Some(v)]])
                .unwrap_or_default());
        }

        if let Some(caps) = CATALOG_COLUMNS.captures(sql) {
            return catalog_rows(state, &caps[1], &caps[2]);
        }

        Err(ConnectionError::new(format!("unsupported query: {sql}")))
    }
}

impl Connection for MemoryDatabase {
    fn execute(&mut self, sql: &str) -> Result<(), ConnectionError> {
        let mut state = self.lock();
        state.executed.push(sql.to_string());
        Self::check_failing(&state, sql)?;
        Self::run_ddl(&mut state, sql)
    }

    fn select_rows(&mut self, sql: &str) -> Result<Vec<Row>, ConnectionError> {
        let mut state = self.lock();
        state.queries.push(sql.to_string());
        Self::check_failing(&state, sql)?;
        Self::run_query(&state, sql)
    }
}

fn unknown_table(name: &str) -> ConnectionError {
    ConnectionError::new(format!("Table '{name}' doesn't exist"))
}

fn catalog_rows(state: &State, select: &str, filter: &str) -> Result<Vec<Row>, ConnectionError> {
    let mut table_name = None;
    let mut column_name = None;
    let mut primary_only = false;
    for caps in CATALOG_FILTER.captures_iter(filter) {
        let value = caps[2].replace("\\'", "'").replace("\\\\", "\\");
        match caps[1].to_ascii_uppercase().as_str() {
            "TABLE_NAME" => table_name = Some(value),
            "COLUMN_NAME" => column_name = Some(value),
            _ => primary_only = value.eq_ignore_ascii_case("PRI"),
        }
    }
    let table_name =
        table_name.ok_or_else(|| ConnectionError::new("catalog query without TABLE_NAME"))?;
    let Some(table) = state.tables.get(&table_name) else {
        return Ok(Vec::new());
    };

    let fields: Vec<String> = select
        .split(',')
        .map(|f| f.trim().to_ascii_uppercase())
        .collect();

    table
        .columns
        .iter()
        .filter(|c| column_name.as_ref().is_none_or(|n| *n == c.name))
        .filter(|c| !primary_only || table.primary_key.contains(&c.name))
        .map(|c| {
            let is_pk = table.primary_key.contains(&c.name);
            fields
                .iter()
                .map(|field| match field.as_str() {
                    "COLUMN_NAME" => Ok(Some(c.name.clone())),
                    "COLUMN_TYPE" => Ok(Some(c.column_type.clone())),
                    "DATA_TYPE" => Ok(Some(
                        c.column_type
                            .split('(')
                            .next()
                            .unwrap_or_default()
                            .to_string(),
                    )),
                    "IS_NULLABLE" => Ok(Some(if c.not_null { "NO" } else { "YES" }.to_string())),
                    "COLUMN_DEFAULT" => Ok(c.default.clone()),
                    "COLUMN_KEY" => Ok(Some(if is_pk { "PRI" } else { "" }.to_string())),
                    "EXTRA" => Ok(Some(c.extra())),
                    other => Err(ConnectionError::new(format!("unknown catalog field {other}"))),
                })
                .collect::<Result<Row, ConnectionError>>()
        })
        .collect()
}

/// Parses the `CREATE TABLE` layout the MySQL dialect produces.
fn parse_create_table(sql: &str) -> Result<MemTable, ConnectionError> {
    let open = sql
        .find('(')
        .ok_or_else(|| ConnectionError::new("CREATE TABLE without column list"))?;
    let close = body_end(sql)
        .ok_or_else(|| ConnectionError::new("unbalanced parentheses in CREATE TABLE"))?;

    let mut table = MemTable {
        options: sql[close + 1..].trim().to_string(),
        ..MemTable::default()
    };
    let mut primary_key = Vec::new();

    for item in split_top_level(&sql[open + 1..close], |c| c == ',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if item.to_ascii_uppercase().starts_with("PRIMARY KEY") {
            let inner_open = item
                .find('(')
                .ok_or_else(|| ConnectionError::new("PRIMARY KEY without columns"))?;
            let inner_close =
                body_end(item).ok_or_else(|| ConnectionError::new("unbalanced PRIMARY KEY"))?;
            primary_key = item[inner_open + 1..inner_close]
                .split(',')
                .map(|c| c.trim().trim_matches('`').to_string())
                .collect();
        } else if item.starts_with('`') {
            let (column, inline_pk) = parse_column(item)?;
            if inline_pk {
                primary_key = vec![column.name.clone()];
            }
            table.columns.push(column);
        }
    }

    table.set_primary_key(primary_key);
    Ok(table)
}

/// Parses `` `name` type [attributes...] ``. The flag is true when the
/// definition says `PRIMARY KEY`.
fn parse_column(definition: &str) -> Result<(MemColumn, bool), ConnectionError> {
    let definition = definition.trim();
    let rest = definition
        .strip_prefix('`')
        .ok_or_else(|| ConnectionError::new(format!("bad column definition: {definition}")))?;
    let end = rest
        .find('`')
        .ok_or_else(|| ConnectionError::new(format!("bad column definition: {definition}")))?;

    let mut column = MemColumn {
        name: rest[..end].to_string(),
        ..MemColumn::default()
    };
    let tokens = split_tokens(&rest[end + 1..]);
    let mut tokens = tokens.into_iter().peekable();
    column.column_type = tokens
        .next()
        .ok_or_else(|| ConnectionError::new(format!("column without type: {definition}")))?
        .to_ascii_lowercase();

    let mut primary_key = false;
    while let Some(token) = tokens.next() {
        match token.to_ascii_uppercase().as_str() {
            "NOT" if tokens.peek().is_some_and(|t| t.eq_ignore_ascii_case("NULL")) => {
                tokens.next();
                column.not_null = true;
            }
            "NULL" => column.not_null = false,
            "DEFAULT" => {
                column.default = tokens
                    .next()
                    .filter(|v| !v.eq_ignore_ascii_case("NULL"))
                    .map(|v| unquote(&v));
            }
            "AUTO_INCREMENT" => column.auto_increment = true,
            "COMMENT" => column.comment = tokens.next().map(|v| unquote(&v)),
            "PRIMARY" if tokens.peek().is_some_and(|t| t.eq_ignore_ascii_case("KEY")) => {
                tokens.next();
                primary_key = true;
                column.not_null = true;
            }
            _ => column.clauses.push(token),
        }
    }
    Ok((column, primary_key))
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .map_or_else(|| value.to_string(), |v| v.replace("''", "'"))
}

/// Splits on `separator` outside quotes and parentheses.
fn split_top_level(text: &str, separator: impl Fn(char) -> bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth = depth.saturating_sub(1),
            c if separator(c) && !in_quote && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn split_tokens(text: &str) -> Vec<String> {
    split_top_level(text, char::is_whitespace)
        .into_iter()
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Session;

    const USERS: &str = "CREATE TABLE `users` (\n  `id` bigint NOT NULL AUTO_INCREMENT,\n  `name` varchar(255) NOT NULL DEFAULT 'a, b',\n  `bio` text,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB";

    #[test]
    fn test_create_and_show() {
        let db = MemoryDatabase::new();
        let mut session = Session::new(db.connection());
        session.execute(USERS).unwrap();

        assert_eq!(session.tables().unwrap(), vec!["users"]);
        let ddl = session.show_create_table("users").unwrap().unwrap();
        assert!(ddl.contains("`id` bigint NOT NULL AUTO_INCREMENT"));
        assert!(ddl.contains("`bio` text DEFAULT NULL"));
        assert!(ddl.ends_with(") ENGINE=InnoDB"));
    }

    #[test]
    fn test_catalog_columns() {
        let db = MemoryDatabase::new();
        let mut session = Session::new(db.connection());
        session.execute(USERS).unwrap();

        let columns = session.columns("users").unwrap();
        assert_eq!(columns.len(), 3);
        assert!(columns[0].is_primary_key());
        assert_eq!(columns[0].extra, "auto_increment");
        assert_eq!(columns[1].default.as_deref(), Some("a, b"));
        assert!(columns[2].nullable);
        assert_eq!(session.primary_keys("users").unwrap(), vec!["id"]);
    }

    #[test]
    fn test_alter_columns() {
        let db = MemoryDatabase::new();
        let mut session = Session::new(db.connection());
        session
            .execute("CREATE TABLE `logs` (\n  `body` text\n)")
            .unwrap();
        session
            .execute("ALTER TABLE `logs` ADD COLUMN `uid` bigint")
            .unwrap();
        session
            .execute("ALTER TABLE `logs` MODIFY COLUMN `uid` BIGINT AUTO_RANDOM(5) PRIMARY KEY")
            .unwrap();

        let columns = session.columns("logs").unwrap();
        assert_eq!(columns[1].extra, "auto_random(5)");
        assert!(!columns[1].nullable);
        assert_eq!(session.primary_keys("logs").unwrap(), vec!["uid"]);

        session
            .execute("ALTER TABLE `logs` DROP COLUMN `body`")
            .unwrap();
        assert_eq!(session.columns("logs").unwrap().len(), 1);
    }

    #[test]
    fn test_variables_and_failures() {
        let db = MemoryDatabase::new()
            .with_variable("version_comment", "MySQL Community Server")
            .failing_on("@@tidb_version");
        let mut session = Session::new(db.connection());

        assert_eq!(
            session.select_value("SELECT VERSION()").unwrap().as_deref(),
            Some("8.0.36")
        );
        assert!(session.select_value("SELECT @@tidb_version").is_err());
        let rows = session
            .select_rows("SHOW VARIABLES LIKE 'version_comment'")
            .unwrap();
        assert_eq!(rows[0][1].as_deref(), Some("MySQL Community Server"));
        assert!(session
            .select_rows("SHOW VARIABLES LIKE 'nothing'")
            .unwrap()
            .is_empty());
        assert_eq!(db.queries().len(), 4);
    }

    #[test]
    fn test_unknown_statement() {
        let mut db = MemoryDatabase::new();
        assert!(db.execute("TRUNCATE `users`").is_err());
        assert!(db.select_rows("SELECT 1").is_err());
    }
}
