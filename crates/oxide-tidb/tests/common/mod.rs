#![allow(dead_code)]

use std::sync::LazyLock;

use oxide_schema::testing::MemoryDatabase;
use oxide_schema::SchemaClient;
use oxide_tidb::AutoRandomExtension;
use regex::Regex;

pub const TIDB_VERSION: &str = "8.0.11-TiDB-v7.5.0";

static BASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"AUTO_RANDOM_BASE=(\d+)\s*").expect("valid regex"));
static CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bAUTO_RANDOM\b(?:\((\d+)\))?").expect("valid regex"));
static PRIMARY_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(PRIMARY KEY \([^)]*\))").expect("valid regex"));

/// Rewrites `SHOW CREATE TABLE` output the way TiDB prints it: the
/// attribute and the base offset inside versioned comments.
pub fn tidb_show_create(ddl: &str) -> String {
    let base = BASE.captures(ddl).map(|caps| caps[1].to_string());
    let ddl = BASE.replace_all(ddl, "");
    let ddl = CLAUSE.replace_all(&ddl, |caps: &regex::Captures<'_>| {
        let bits = caps.get(1).map_or("5", |m| m.as_str());
        format!("/*T![auto_rand] AUTO_RANDOM({bits}) */")
    });
    let mut ddl = PRIMARY_KEY
        .replace_all(&ddl, "$1 /*T![clustered_index] CLUSTERED */")
        .trim_end()
        .to_string();
    if let Some(base) = base {
        ddl.push_str(&format!(" /*T![auto_rand_base] AUTO_RANDOM_BASE={base} */"));
    }
    ddl
}

/// A TiDB that prints AUTO_RANDOM in versioned comments.
pub fn tidb() -> MemoryDatabase {
    MemoryDatabase::new()
        .with_version(TIDB_VERSION)
        .with_variable("tidb_version", "Release Version: v7.5.0\nEdition: Community")
        .with_show_create_rewrite(tidb_show_create)
}

/// A TiDB that prints AUTO_RANDOM as plain clauses.
pub fn tidb_plain() -> MemoryDatabase {
    MemoryDatabase::new().with_version(TIDB_VERSION)
}

/// A plain MySQL server.
pub fn mysql() -> MemoryDatabase {
    MemoryDatabase::new().with_variable("version_comment", "MySQL Community Server - GPL")
}

/// A client on `db` with the extension installed.
pub fn client(db: &MemoryDatabase) -> SchemaClient {
    SchemaClient::new(db.connection()).with_extension(AutoRandomExtension::new())
}

/// The `create_table` line of `table` in exported text.
pub fn create_table_line<'a>(schemafile: &'a str, table: &str) -> &'a str {
    let prefix = format!("create_table \"{table}\"");
    schemafile
        .lines()
        .find(|line| line.starts_with(&prefix))
        .unwrap_or_else(|| panic!("no create_table line for {table} in:\n{schemafile}"))
}
