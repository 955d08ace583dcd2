//! Adds table-level `auto_random:` and `auto_random_base:` to exported
//! Schemafile text.
//!
//! The host writes `create_table` lines without knowing about AUTO_RANDOM.
//! For every table that has the attribute in the database, the matching
//! line is found by its name and the keys are spliced in right after the
//! `id:` option (or first, when there is none). A line that already
//! mentions either key is left alone, so running the injector twice
//! changes nothing.

use std::sync::LazyLock;

use oxide_schema::{OptionValue, Session};
use regex::Regex;
use tracing::debug;

use crate::extractor::{extract_table_attributes, TableAttributes};
use crate::options::{AUTO_RANDOM_BASE_KEY, AUTO_RANDOM_KEY};

static EXISTING_KEYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bauto_random(?:_base)?\s*:").expect("valid regex"));
static BASE_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAUTO_RANDOM_BASE\s*=\s*\d+").expect("valid regex"));

/// Injects the attributes of every table in the database into `schemafile`.
pub fn inject(session: &mut Session, schemafile: String) -> String {
    let tables = match session.tables() {
        Ok(tables) => tables,
        Err(err) => {
            debug!(error = %err, "could not list tables, export left as is");
            return schemafile;
        }
    };

    tables.iter().fold(schemafile, |text, table| {
        let attributes = extract_table_attributes(session, table);
        if attributes.is_empty() {
            text
        } else {
            inject_table(&text, table, &attributes)
        }
    })
}

/// Injects one table's attributes into its `create_table` line.
#[must_use]
pub fn inject_table(schemafile: &str, table: &str, attributes: &TableAttributes) -> String {
    let name = regex::escape(&OptionValue::string(table).to_string());
    let pattern = format!(r"(?m)^([ \t]*create_table\s+{name})(.*?)(\s+do\s*\|t\|)");
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => {
            debug!(table = %table, error = %err, "bad table pattern");
            return schemafile.to_string();
        }
    };
    let Some(caps) = re.captures(schemafile) else {
        debug!(table = %table, "no create_table line");
        return schemafile.to_string();
    };
    let (Some(whole), Some(head), Some(options), Some(tail)) =
        (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
    else {
        return schemafile.to_string();
    };

    if EXISTING_KEYS.is_match(options.as_str()) {
        debug!(table = %table, "auto_random already present");
        return schemafile.to_string();
    }

    let mut fragments: Vec<String> =
        split_fragments(options.as_str().trim_start_matches([',', ' ']))
            .into_iter()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(ToString::to_string)
            .collect();
    let implicit_id = !fragments.iter().any(|f| is_key(f, "id") && value_of(f) == "false");

    let mut injected = Vec::new();
    if let Some((column, attribute)) = &attributes.identity {
        if implicit_id {
            injected.push(format!("{AUTO_RANDOM_KEY}: {}", attribute.to_option_value()));
        } else {
            debug!(
                table = %table,
                column = %column,
                "explicit primary key, auto_random stays on the column"
            );
        }
    }
    if let Some(base) = attributes.base {
        injected.push(format!("{AUTO_RANDOM_BASE_KEY}: {base}"));
        fragments = fragments
            .into_iter()
            .filter_map(|f| if is_key(&f, "options") { strip_base(&f) } else { Some(f) })
            .collect();
    }
    if injected.is_empty() {
        return schemafile.to_string();
    }

    let at = fragments
        .iter()
        .position(|f| is_key(f, "id"))
        .map_or(0, |i| i + 1);
    for (offset, fragment) in injected.into_iter().enumerate() {
        fragments.insert(at + offset, fragment);
    }

    let line = format!("{}, {}{}", head.as_str(), fragments.join(", "), tail.as_str());
    let mut out = String::with_capacity(schemafile.len() + line.len());
    out.push_str(&schemafile[..whole.start()]);
    out.push_str(&line);
    out.push_str(&schemafile[whole.end()..]);
    out
}

fn is_key(fragment: &str, key: &str) -> bool {
    fragment
        .strip_prefix(key)
        .is_some_and(|rest| rest.trim_start().starts_with(':'))
}

fn value_of(fragment: &str) -> &str {
    fragment
        .split_once(':')
        .map_or("", |(_, value)| value.trim())
}

/// Removes a plain `AUTO_RANDOM_BASE=<n>` from an `options: "..."`
/// fragment. `None` if the string ends up empty.
fn strip_base(fragment: &str) -> Option<String> {
    let value = value_of(fragment);
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return Some(fragment.to_string());
    };
    if !BASE_FRAGMENT.is_match(inner) {
        return Some(fragment.to_string());
    }
    let rest = BASE_FRAGMENT.replace_all(inner, " ");
    let rest = rest.split_whitespace().collect::<Vec<_>>().join(" ");
    (!rest.is_empty()).then(|| format!("options: \"{rest}\""))
}

/// Splits an option list on commas outside strings, arrays and hashes.
fn split_fragments(options: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in options.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&options[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&options[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AutoRandom;

    const EXPORT: &str = "# -*- mode: ruby -*-\n# vi: set ft=ruby :\n\ncreate_table \"user_logs\", options: \"ENGINE=InnoDB\" do |t|\n  t.text \"body\"\nend\n\ncreate_table \"users\", id: :bigint, default: nil, options: \"ENGINE=InnoDB\" do |t|\n  t.string \"name\", null: false\nend\n";

    fn users() -> TableAttributes {
        TableAttributes {
            base: Some(100_000),
            identity: Some(("id".to_string(), AutoRandom::Bits(5))),
        }
    }

    #[test]
    fn test_splices_after_id() {
        let out = inject_table(EXPORT, "users", &users());
        assert!(out.contains(
            "create_table \"users\", id: :bigint, auto_random: 5, auto_random_base: 100000, default: nil, options: \"ENGINE=InnoDB\" do |t|"
        ));
        assert!(out.contains("create_table \"user_logs\", options: \"ENGINE=InnoDB\" do |t|"));
    }

    #[test]
    fn test_is_idempotent() {
        let once = inject_table(EXPORT, "users", &users());
        let twice = inject_table(&once, "users", &users());
        assert_eq!(once, twice);
        assert_eq!(twice.matches("auto_random:").count(), 1);
        assert_eq!(twice.matches("auto_random_base:").count(), 1);
    }

    #[test]
    fn test_without_options_or_id() {
        let text = "create_table \"logs\" do |t|\nend\n";
        let attributes = TableAttributes {
            base: None,
            identity: Some(("id".to_string(), AutoRandom::Default)),
        };
        assert_eq!(
            inject_table(text, "logs", &attributes),
            "create_table \"logs\", auto_random: true do |t|\nend\n"
        );
    }

    #[test]
    fn test_explicit_primary_key_gets_base_only() {
        let text = "create_table \"events\", id: false, options: \"AUTO_RANDOM_BASE=10 ENGINE=InnoDB\" do |t|\n  t.bigint \"id\", null: false, primary_key: true, auto_random: 6\nend\n";
        let attributes = TableAttributes {
            base: Some(10),
            identity: Some(("id".to_string(), AutoRandom::Bits(6))),
        };
        assert_eq!(
            inject_table(text, "events", &attributes),
            "create_table \"events\", id: false, auto_random_base: 10, options: \"ENGINE=InnoDB\" do |t|\n  t.bigint \"id\", null: false, primary_key: true, auto_random: 6\nend\n"
        );
    }

    #[test]
    fn test_emptied_options_are_dropped() {
        let text = "create_table \"t\", options: \"AUTO_RANDOM_BASE=10\" do |t|\nend\n";
        let attributes = TableAttributes {
            base: Some(10),
            identity: None,
        };
        assert_eq!(
            inject_table(text, "t", &attributes),
            "create_table \"t\", auto_random_base: 10 do |t|\nend\n"
        );
    }

    #[test]
    fn test_split_fragments() {
        assert_eq!(
            split_fragments(
                "id: { type: :integer, limit: 8 }, options: \"a, b\", primary_key: [\"a\", \"b\"]"
            ),
            vec![
                "id: { type: :integer, limit: 8 }",
                " options: \"a, b\"",
                " primary_key: [\"a\", \"b\"]"
            ]
        );
    }
}
