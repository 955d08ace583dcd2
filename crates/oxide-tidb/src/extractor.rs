//! Reads AUTO_RANDOM back out of a live database.
//!
//! The primary source is `SHOW CREATE TABLE`. TiDB prints the column
//! attribute either as a plain clause (`AUTO_RANDOM(5)`) or wrapped in a
//! versioned comment (`/*T![auto_rand] AUTO_RANDOM(5) */`); the plain clause
//! wins when a column somehow carries both. When the DDL cannot be read,
//! `information_schema.COLUMNS.EXTRA` is consulted instead, which only tells
//! whether the attribute is there, not its width.
//!
//! Nothing here fails: an unreadable catalog means "no attribute".

use std::sync::LazyLock;

use oxide_schema::Session;
use regex::{Captures, Regex};
use tracing::debug;

use crate::options::AutoRandom;

static PLAIN_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bAUTO_RANDOM\b(?:\s*\(\s*(\d+)\s*(?:,\s*\d+\s*)?\))?").expect("valid regex")
});
static COMMENT_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)/\*T!\[auto_rand\]\s*AUTO_RANDOM\b(?:\s*\(\s*(\d+)\s*(?:,\s*\d+\s*)?\))?\s*\*/",
    )
    .expect("valid regex")
});
static BASE_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAUTO_RANDOM_BASE\s*=\s*(\d+)").expect("valid regex"));

const EXTRA_MARKER: &str = "auto_random";

/// Table-level attributes found in the database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableAttributes {
    /// `AUTO_RANDOM_BASE`.
    pub base: Option<u64>,
    /// The column carrying AUTO_RANDOM, with its attribute.
    pub identity: Option<(String, AutoRandom)>,
}

impl TableAttributes {
    /// Returns true if nothing was found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.base.is_none() && self.identity.is_none()
    }
}

/// AUTO_RANDOM on `table.column`, if any.
pub fn extract_column_attribute(
    session: &mut Session,
    table: &str,
    column: &str,
) -> Option<AutoRandom> {
    match show_create(session, table) {
        Some(ddl) => column_attribute_from_ddl(&ddl, column),
        None => extra_flags(session, table, Some(column))
            .into_iter()
            .next()
            .map(|_| AutoRandom::Default),
    }
}

/// AUTO_RANDOM_BASE and the AUTO_RANDOM column of `table`.
pub fn extract_table_attributes(session: &mut Session, table: &str) -> TableAttributes {
    match show_create(session, table) {
        Some(ddl) => TableAttributes {
            base: base_from_ddl(&ddl),
            identity: identity_from_ddl(&ddl),
        },
        None => TableAttributes {
            base: None,
            identity: extra_flags(session, table, None)
                .into_iter()
                .next()
                .map(|column| (column, AutoRandom::Default)),
        },
    }
}

fn show_create(session: &mut Session, table: &str) -> Option<String> {
    match session.show_create_table(table) {
        Ok(Some(ddl)) if !ddl.trim().is_empty() => Some(ddl),
        Ok(_) => {
            debug!(table = %table, "no CREATE TABLE text, falling back to the catalog");
            None
        }
        Err(err) => {
            debug!(
                table = %table,
                error = %err,
                "SHOW CREATE TABLE failed, falling back to the catalog"
            );
            None
        }
    }
}

/// Names of the columns whose `EXTRA` mentions AUTO_RANDOM.
fn extra_flags(session: &mut Session, table: &str, column: Option<&str>) -> Vec<String> {
    let mut sql = format!(
        "SELECT COLUMN_NAME, EXTRA FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {}",
        Session::quote(table)
    );
    if let Some(column) = column {
        sql.push_str(&format!(" AND COLUMN_NAME = {}", Session::quote(column)));
    }
    sql.push_str(" ORDER BY ORDINAL_POSITION");

    match session.select_rows(&sql) {
        Ok(rows) => rows
            .into_iter()
            .filter_map(|row| {
                let mut values = row.into_iter();
                let name = values.next().flatten()?;
                let extra = values.next().flatten()?;
                extra.to_ascii_lowercase().contains(EXTRA_MARKER).then_some(name)
            })
            .collect(),
        Err(err) => {
            debug!(table = %table, error = %err, "catalog lookup failed");
            Vec::new()
        }
    }
}

/// Reads AUTO_RANDOM for one column out of `CREATE TABLE` text.
#[must_use]
pub fn column_attribute_from_ddl(ddl: &str, column: &str) -> Option<AutoRandom> {
    column_elements(ddl)
        .into_iter()
        .find(|(name, _)| name == column)
        .and_then(|(_, element)| attribute_of(element))
}

/// Finds the first column whose definition carries AUTO_RANDOM.
#[must_use]
pub fn identity_from_ddl(ddl: &str) -> Option<(String, AutoRandom)> {
    column_elements(ddl)
        .into_iter()
        .find_map(|(name, element)| attribute_of(element).map(|attr| (name, attr)))
}

/// Reads `AUTO_RANDOM_BASE` from the table options after the column list.
#[must_use]
pub fn base_from_ddl(ddl: &str) -> Option<u64> {
    let (_, close) = body_bounds(ddl)?;
    BASE_OPTION
        .captures(&ddl[close + 1..])
        .and_then(|caps| caps[1].parse().ok())
}

fn attribute_of(element: &str) -> Option<AutoRandom> {
    let code = strip_comments_and_literals(element);
    if let Some(caps) = PLAIN_CLAUSE.captures(&code) {
        return Some(from_captures(&caps));
    }
    COMMENT_CLAUSE.captures(element).map(|caps| from_captures(&caps))
}

fn from_captures(caps: &Captures<'_>) -> AutoRandom {
    caps.get(1)
        .and_then(|bits| bits.as_str().parse::<u8>().ok())
        .filter(|bits| *bits > 0)
        .map_or(AutoRandom::Default, AutoRandom::Bits)
}

/// Column elements of the `CREATE TABLE` body as `(name, definition)`.
/// Keys and constraints are skipped.
fn column_elements(ddl: &str) -> Vec<(String, &str)> {
    let Some((open, close)) = body_bounds(ddl) else {
        return Vec::new();
    };
    split_elements(&ddl[open + 1..close])
        .into_iter()
        .filter_map(|element| {
            let element = element.trim();
            let name = match element.strip_prefix('`') {
                Some(rest) => rest.split('`').next()?.to_string(),
                None => {
                    let word = element.split_whitespace().next()?;
                    if is_constraint_keyword(word) {
                        return None;
                    }
                    word.to_string()
                }
            };
            Some((name, element))
        })
        .collect()
}

fn is_constraint_keyword(word: &str) -> bool {
    ["PRIMARY", "KEY", "INDEX", "UNIQUE", "CONSTRAINT", "FOREIGN", "FULLTEXT", "SPATIAL", "CHECK"]
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

/// Lexical state shared by the scanners below.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Quoted(char),
    Comment,
}

/// Byte offsets of the parentheses around the column list.
fn body_bounds(ddl: &str) -> Option<(usize, usize)> {
    let open = ddl.find('(')?;
    let mut depth = 0usize;
    let mut state = Scan::Code;
    let bytes = ddl.as_bytes();
    let mut i = open;
    while i < bytes.len() {
        let c = bytes[i];
        match state {
            Scan::Quoted(q) => {
                if c == b'\\' {
                    i += 1;
                } else if char::from(c) == q {
                    state = Scan::Code;
                }
            }
            Scan::Comment => {
                if c == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = Scan::Code;
                    i += 1;
                }
            }
            Scan::Code => match c {
                b'\'' | b'"' | b'`' => state = Scan::Quoted(char::from(c)),
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = Scan::Comment;
                    i += 1;
                }
                b'(' => depth += 1,
                b')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some((open, i));
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Splits a column list on top-level commas.
fn split_elements(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut state = Scan::Code;
    let mut start = 0;
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match state {
            Scan::Quoted(q) => {
                if c == b'\\' {
                    i += 1;
                } else if char::from(c) == q {
                    state = Scan::Code;
                }
            }
            Scan::Comment => {
                if c == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = Scan::Code;
                    i += 1;
                }
            }
            Scan::Code => match c {
                b'\'' | b'"' | b'`' => state = Scan::Quoted(char::from(c)),
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = Scan::Comment;
                    i += 1;
                }
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    parts.push(&body[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    parts.push(&body[start..]);
    parts
}

/// The element with comments removed and quoted text emptied, so only
/// real clauses can match.
fn strip_comments_and_literals(element: &str) -> String {
    let mut out = String::with_capacity(element.len());
    let mut state = Scan::Code;
    let mut chars = element.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            Scan::Quoted(q) => {
                if c == '\\' {
                    chars.next();
                } else if c == q {
                    out.push(q);
                    state = Scan::Code;
                }
            }
            Scan::Comment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push(' ');
                    state = Scan::Code;
                }
            }
            Scan::Code => match c {
                '\'' | '"' | '`' => {
                    out.push(c);
                    state = Scan::Quoted(c);
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = Scan::Comment;
                }
                _ => out.push(c),
            },
        }
    }
    out
}
