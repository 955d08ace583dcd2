//! Turns `auto_random:` declarations into TiDB DDL.
//!
//! Table-level keys are taken out of the `create_table` options before the
//! host validates them. The identity column is built by the host from the
//! `id:` hash, which only forwards keys the host knows, so the requested
//! attribute travels to column rendering through the [`CreateContext`].

use std::sync::LazyLock;

use oxide_schema::{ColumnDefinition, CreateContext, OptionMap, OptionValue, Session, SqlType};
use regex::Regex;
use tracing::{debug, warn};

use crate::detector::supports_auto_random;
use crate::error::{Result, TidbError};
use crate::options::{AutoRandom, ExtensionOptionSet, AUTO_RANDOM_BASE_KEY, AUTO_RANDOM_KEY};

static BASE_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAUTO_RANDOM_BASE\s*=\s*\d+").expect("valid regex"));

/// Rewrites `create_table` options in place.
///
/// Both extension keys are always removed. On TiDB the attribute is moved
/// into the `id:` hash (next to `auto_increment: false`) and stashed for
/// [`render_column`]; the base offset becomes the first fragment of the
/// `options:` string.
pub fn prepare_create_table(
    session: &mut Session,
    table: &str,
    options: &mut OptionMap,
    ctx: &mut CreateContext,
) -> Result<()> {
    let identity = options
        .get("primary_key")
        .and_then(OptionValue::as_str)
        .unwrap_or("id")
        .to_string();

    let table_level = ExtensionOptionSet::take(options, table, &identity)?;
    let from_id_hash = match options.get_mut("id") {
        Some(OptionValue::Map(id)) => id
            .remove(AUTO_RANDOM_KEY)
            .map(|value| AutoRandom::from_option_value(&value, table, &identity))
            .transpose()?,
        _ => None,
    };
    // A value inside `id: { ... }` belongs to the column and wins.
    let attribute = match from_id_hash {
        Some(explicit) => explicit,
        None => table_level.auto_random,
    };

    if attribute.is_none() && table_level.auto_random_base.is_none() {
        return Ok(());
    }
    if !supports_auto_random(session) {
        debug!(table = %table, "not TiDB, ignoring auto_random options");
        return Ok(());
    }

    if let Some(attribute) = attribute {
        if matches!(options.get("id"), Some(OptionValue::Bool(false))) {
            debug!(table = %table, "id: false, auto_random left to the primary key column");
        } else {
            let mut id = identity_hash(table, &identity, options.get("id"))?;
            id.insert(AUTO_RANDOM_KEY, attribute.to_option_value());
            id.insert("auto_increment", false);
            options.insert("id", id);
            ctx.stash(AUTO_RANDOM_KEY, attribute.to_option_value());
        }
    }

    if let Some(base) = table_level.auto_random_base {
        let existing = options.get("options").and_then(OptionValue::as_str).unwrap_or("");
        let rest = BASE_FRAGMENT.replace_all(existing, " ");
        let merged = std::iter::once(format!("AUTO_RANDOM_BASE={base}"))
            .chain(rest.split_whitespace().map(ToString::to_string))
            .collect::<Vec<_>>()
            .join(" ");
        options.insert("options", OptionValue::String(merged));
    }

    Ok(())
}

/// `id:` as a hash: absent or `true` is `{}`, a type is `{ type: ... }`.
fn identity_hash(table: &str, column: &str, id: Option<&OptionValue>) -> Result<OptionMap> {
    match id {
        None | Some(OptionValue::Bool(true)) => Ok(OptionMap::new()),
        Some(OptionValue::Symbol(t) | OptionValue::String(t)) => {
            Ok(OptionMap::new().with("type", OptionValue::symbol(t.clone())))
        }
        Some(OptionValue::Map(map)) => Ok(map.clone()),
        Some(other) => Err(TidbError::violation(
            table,
            column,
            format!("cannot attach auto_random to `id: {other}`"),
        )),
    }
}

/// Adds the AUTO_RANDOM clause while a `CREATE TABLE` column is rendered.
///
/// A column's own `auto_random:` wins and discards the stashed value;
/// otherwise the stash goes to the first primary key column.
pub fn render_column(
    session: &mut Session,
    column: &mut ColumnDefinition,
    clauses: &mut Vec<String>,
    ctx: &mut CreateContext,
) -> Result<()> {
    let table = ctx.table().to_string();
    let attribute = match column.extensions.remove(AUTO_RANDOM_KEY) {
        Some(value) => {
            ctx.take(AUTO_RANDOM_KEY);
            if !supports_auto_random(session) {
                debug!(table = %table, column = %column.name, "not TiDB, ignoring auto_random");
                return Ok(());
            }
            AutoRandom::from_option_value(&value, &table, &column.name)?
        }
        None if column.is_primary_key() => match ctx.take(AUTO_RANDOM_KEY) {
            Some(value) => AutoRandom::from_option_value(&value, &table, &column.name)?,
            None => None,
        },
        None => None,
    };

    if let Some(attribute) = attribute {
        validate_column(&table, column)?;
        column.auto_increment = false;
        clauses.push(attribute.to_sql());
        debug!(table = %table, column = %column.name, clause = %attribute, "auto_random column");
    }
    Ok(())
}

/// Prepares an `ADD COLUMN` that requests AUTO_RANDOM and returns the
/// `MODIFY COLUMN` statement that sets it.
pub fn prepare_add_column(
    session: &mut Session,
    table: &str,
    column: &mut ColumnDefinition,
) -> Result<Vec<String>> {
    let Some(value) = column.extensions.remove(AUTO_RANDOM_KEY) else {
        return Ok(Vec::new());
    };
    if !supports_auto_random(session) {
        debug!(table = %table, column = %column.name, "not TiDB, ignoring auto_random");
        return Ok(Vec::new());
    }
    let Some(attribute) = AutoRandom::from_option_value(&value, table, &column.name)? else {
        return Ok(Vec::new());
    };

    validate_column(table, column)?;
    match session.primary_keys(table) {
        Ok(keys) if !keys.is_empty() => {
            return Err(TidbError::violation(
                table,
                &column.name,
                format!("table already has a primary key ({})", keys.join(", ")),
            ));
        }
        Ok(_) => {}
        Err(err) => {
            warn!(
                table = %table,
                error = %err,
                "could not read the primary key, skipping the check"
            );
        }
    }

    column.auto_increment = false;
    let type_name = modify_type_name(table, column)?;
    Ok(vec![format!(
        "ALTER TABLE {} MODIFY COLUMN {} {type_name} {attribute} PRIMARY KEY",
        Session::quote_identifier(table),
        Session::quote_identifier(&column.name),
    )])
}

/// The type keyword of the `MODIFY COLUMN` that sets AUTO_RANDOM.
fn modify_type_name(table: &str, column: &ColumnDefinition) -> Result<&'static str> {
    match column.sql_type {
        SqlType::Integer => Ok("INT"),
        SqlType::BigInt => Ok("BIGINT"),
        ref other => Err(TidbError::UnsupportedFeature {
            table: table.to_string(),
            column: column.name.clone(),
            sql_type: other.dsl_name().to_string(),
        }),
    }
}

/// AUTO_RANDOM needs an integer primary key.
pub fn validate_column(table: &str, column: &ColumnDefinition) -> Result<()> {
    if !column.sql_type.is_integer() {
        return Err(TidbError::violation(
            table,
            &column.name,
            format!(
                "auto_random requires :bigint or :integer, got :{}",
                column.sql_type.dsl_name()
            ),
        ));
    }
    if column.primary_key == Some(false) {
        return Err(TidbError::violation(
            table,
            &column.name,
            "auto_random requires a primary key column, got primary_key: false",
        ));
    }
    Ok(())
}

/// Returns true if `options` mentions either extension key.
#[must_use]
pub fn has_extension_keys(options: &OptionMap) -> bool {
    options.contains_key(AUTO_RANDOM_KEY) || options.contains_key(AUTO_RANDOM_BASE_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_schema::testing::MemoryDatabase;

    fn tidb() -> Session {
        Session::new(
            MemoryDatabase::new()
                .with_version("8.0.11-TiDB-v7.5.0")
                .connection(),
        )
    }

    #[test]
    fn test_table_options_are_rewritten() {
        let mut session = tidb();
        let mut ctx = CreateContext::new("users");
        let mut options = OptionMap::new()
            .with(AUTO_RANDOM_KEY, 5)
            .with(AUTO_RANDOM_BASE_KEY, 100_000)
            .with("options", OptionValue::string("ENGINE=InnoDB AUTO_RANDOM_BASE=7"));

        prepare_create_table(&mut session, "users", &mut options, &mut ctx).unwrap();

        assert!(!has_extension_keys(&options));
        assert_eq!(
            options.get("options"),
            Some(&OptionValue::string("AUTO_RANDOM_BASE=100000 ENGINE=InnoDB"))
        );
        let id = options.get("id").and_then(OptionValue::as_map).unwrap();
        assert_eq!(id.get("auto_increment"), Some(&OptionValue::Bool(false)));
        assert_eq!(id.get(AUTO_RANDOM_KEY), Some(&OptionValue::Integer(5)));
        assert_eq!(ctx.peek(AUTO_RANDOM_KEY), Some(&OptionValue::Integer(5)));
    }

    #[test]
    fn test_id_hash_wins_over_table_level() {
        let mut session = tidb();
        let mut ctx = CreateContext::new("users");
        let mut options = OptionMap::new()
            .with("id", OptionMap::new().with(AUTO_RANDOM_KEY, 3))
            .with(AUTO_RANDOM_KEY, 5);

        prepare_create_table(&mut session, "users", &mut options, &mut ctx).unwrap();
        assert_eq!(ctx.take(AUTO_RANDOM_KEY), Some(OptionValue::Integer(3)));
    }

    #[test]
    fn test_type_symbol_is_kept() {
        let mut session = tidb();
        let mut ctx = CreateContext::new("users");
        let mut options = OptionMap::new()
            .with("id", OptionValue::symbol("integer"))
            .with(AUTO_RANDOM_KEY, true);

        prepare_create_table(&mut session, "users", &mut options, &mut ctx).unwrap();
        let id = options.get("id").and_then(OptionValue::as_map).unwrap();
        assert_eq!(id.get("type"), Some(&OptionValue::symbol("integer")));
        assert_eq!(ctx.peek(AUTO_RANDOM_KEY), Some(&OptionValue::Bool(true)));
    }

    #[test]
    fn test_id_false_leaves_nothing_stashed() {
        let mut session = tidb();
        let mut ctx = CreateContext::new("seqs");
        let mut options = OptionMap::new()
            .with("id", false)
            .with(AUTO_RANDOM_KEY, 5);

        prepare_create_table(&mut session, "seqs", &mut options, &mut ctx).unwrap();
        assert_eq!(options.get("id"), Some(&OptionValue::Bool(false)));
        assert!(!has_extension_keys(&options));
        assert_eq!(ctx.peek(AUTO_RANDOM_KEY), None);
    }

    #[test]
    fn test_mysql_strips_only() {
        let db = MemoryDatabase::new();
        let mut session = Session::new(db.connection());
        let mut ctx = CreateContext::new("users");
        let mut options = OptionMap::new()
            .with(AUTO_RANDOM_KEY, 5)
            .with(AUTO_RANDOM_BASE_KEY, 10);

        prepare_create_table(&mut session, "users", &mut options, &mut ctx).unwrap();
        assert!(options.is_empty());
        assert_eq!(ctx.peek(AUTO_RANDOM_KEY), None);
    }

    #[test]
    fn test_render_column_from_stash() {
        let mut session = tidb();
        let mut ctx = CreateContext::new("users");
        ctx.stash(AUTO_RANDOM_KEY, 5);

        let mut name = ColumnDefinition::new("name", SqlType::String(255));
        let mut clauses = Vec::new();
        render_column(&mut session, &mut name, &mut clauses, &mut ctx).unwrap();
        assert!(clauses.is_empty());

        let mut id = ColumnDefinition::new("id", SqlType::BigInt);
        id.primary_key = Some(true);
        id.auto_increment = true;
        render_column(&mut session, &mut id, &mut clauses, &mut ctx).unwrap();
        assert_eq!(clauses, vec!["AUTO_RANDOM(5)"]);
        assert!(!id.auto_increment);
        assert_eq!(ctx.peek(AUTO_RANDOM_KEY), None);
    }

    #[test]
    fn test_column_value_discards_stash() {
        let mut session = tidb();
        let mut ctx = CreateContext::new("events");
        ctx.stash(AUTO_RANDOM_KEY, 5);

        let mut id = ColumnDefinition::new("id", SqlType::BigInt);
        id.primary_key = Some(true);
        id.extensions.insert(AUTO_RANDOM_KEY, 6);
        let mut clauses = Vec::new();
        render_column(&mut session, &mut id, &mut clauses, &mut ctx).unwrap();

        assert_eq!(clauses, vec!["AUTO_RANDOM(6)"]);
        assert!(id.extensions.is_empty());
        assert_eq!(ctx.peek(AUTO_RANDOM_KEY), None);
    }

    #[test]
    fn test_validation() {
        let mut text = ColumnDefinition::new("body", SqlType::Text);
        text.primary_key = Some(true);
        assert!(matches!(
            validate_column("posts", &text),
            Err(TidbError::ConstraintViolation { column, reason, .. })
                if column == "body" && reason.contains(":text")
        ));
        assert!(matches!(
            modify_type_name("posts", &text),
            Err(TidbError::UnsupportedFeature { sql_type, .. }) if sql_type == "text"
        ));
        assert_eq!(
            modify_type_name("posts", &ColumnDefinition::new("n", SqlType::Integer)).unwrap(),
            "INT"
        );

        let mut id = ColumnDefinition::new("id", SqlType::BigInt);
        id.primary_key = Some(false);
        assert!(matches!(
            validate_column("posts", &id),
            Err(TidbError::ConstraintViolation { column, .. }) if column == "id"
        ));
    }

    #[test]
    fn test_add_column_statement() {
        let db = MemoryDatabase::new().with_version("8.0.11-TiDB-v7.5.0");
        let mut session = Session::new(db.connection());
        session.execute("CREATE TABLE `logs` (\n  `body` text\n)").unwrap();

        let mut column = ColumnDefinition::new("uid", SqlType::BigInt);
        column.extensions.insert(AUTO_RANDOM_KEY, 5);
        let statements = prepare_add_column(&mut session, "logs", &mut column).unwrap();
        assert_eq!(
            statements,
            vec!["ALTER TABLE `logs` MODIFY COLUMN `uid` BIGINT AUTO_RANDOM(5) PRIMARY KEY"]
        );
        assert!(column.extensions.is_empty());
    }

    #[test]
    fn test_add_column_to_table_with_primary_key() {
        let db = MemoryDatabase::new().with_version("8.0.11-TiDB-v7.5.0");
        let mut session = Session::new(db.connection());
        session
            .execute("CREATE TABLE `logs` (\n  `id` bigint NOT NULL,\n  PRIMARY KEY (`id`)\n)")
            .unwrap();

        let mut column = ColumnDefinition::new("uid", SqlType::BigInt);
        column.extensions.insert(AUTO_RANDOM_KEY, true);
        let err = prepare_add_column(&mut session, "logs", &mut column).unwrap_err();
        assert!(matches!(
            err,
            TidbError::ConstraintViolation { ref reason, .. } if reason.contains("(id)")
        ));
    }

    #[test]
    fn test_add_column_lookup_failure_skips_check() {
        let db = MemoryDatabase::new()
            .with_version("8.0.11-TiDB-v7.5.0")
            .failing_on("COLUMN_KEY");
        let mut session = Session::new(db.connection());

        let mut column = ColumnDefinition::new("uid", SqlType::Integer);
        column.extensions.insert(AUTO_RANDOM_KEY, true);
        let statements = prepare_add_column(&mut session, "logs", &mut column).unwrap();
        assert_eq!(
            statements,
            vec!["ALTER TABLE `logs` MODIFY COLUMN `uid` INT AUTO_RANDOM PRIMARY KEY"]
        );
    }
}
