//! Export-path integration tests: apply, export, apply again.

mod common;

use std::io::Write as _;

use common::{client, create_table_line, tidb, tidb_plain};
use oxide_schema::{load_schemafile, OptionValue};

const USERS: &str = r#"
create_table "users", auto_random: 5, auto_random_base: 100000, options: "ENGINE=InnoDB" do |t|
  t.string "name", null: false
end
"#;

const USERS_LINE: &str = "create_table \"users\", id: :bigint, auto_random: 5, auto_random_base: 100000, default: nil, options: \"ENGINE=InnoDB\" do |t|";

#[test]
fn test_export_carries_both_keys_once() {
    let db = tidb();
    client(&db).apply(USERS).unwrap();

    let export = client(&db).dump().unwrap();
    assert_eq!(create_table_line(&export, "users"), USERS_LINE);
    assert_eq!(export.matches("auto_random:").count(), 1);
    assert_eq!(export.matches("auto_random_base:").count(), 1);
    assert!(!export.contains("AUTO_RANDOM"), "{export}");
}

#[test]
fn test_export_apply_export_is_a_fixed_point() {
    let db = tidb();
    client(&db).apply(USERS).unwrap();
    let first = client(&db).dump().unwrap();

    let fresh = tidb();
    client(&fresh).apply(&first).unwrap();
    let second = client(&fresh).dump().unwrap();
    assert_eq!(first, second);

    client(&fresh).apply(&second).unwrap();
    let third = client(&fresh).dump().unwrap();
    assert_eq!(second, third);
    assert_eq!(third.matches("auto_random:").count(), 1);
    assert_eq!(third.matches("auto_random_base:").count(), 1);
}

#[test]
fn test_reapplying_the_export_changes_nothing() {
    let db = tidb();
    client(&db).apply(USERS).unwrap();
    let export = client(&db).dump().unwrap();

    let mut client = client(&db);
    let diff = client.diff(&export).unwrap();
    assert!(diff.operations.is_empty(), "{diff}");
    assert!(client.apply(&export).unwrap().is_empty());
}

#[test]
fn test_repeated_dumps_are_identical() {
    let db = tidb();
    let mut client = client(&db);
    client.apply(USERS).unwrap();
    assert_eq!(client.dump().unwrap(), client.dump().unwrap());
}

#[test]
fn test_plain_clauses_export_the_same_text() {
    let commented = tidb();
    client(&commented).apply(USERS).unwrap();
    let plain = tidb_plain();
    client(&plain).apply(USERS).unwrap();

    let ddl = plain.show_create_table("users").unwrap();
    assert!(ddl.contains("AUTO_RANDOM(5)"), "{ddl}");
    assert!(ddl.contains("AUTO_RANDOM_BASE=100000"), "{ddl}");

    assert_eq!(
        client(&plain).dump().unwrap(),
        client(&commented).dump().unwrap()
    );
}

#[test]
fn test_explicit_primary_key_exported_at_column_level() {
    let schemafile = r#"
create_table "shards", id: false, auto_random_base: 42 do |t|
  t.bigint "sid", null: false, primary_key: true, auto_random: 4
  t.string "name"
end
"#;
    let db = tidb();
    client(&db).apply(schemafile).unwrap();

    let export = client(&db).dump().unwrap();
    assert_eq!(
        create_table_line(&export, "shards"),
        "create_table \"shards\", id: false, auto_random_base: 42 do |t|"
    );
    assert!(
        export.contains("t.bigint \"sid\", null: false, primary_key: true, auto_random: 4"),
        "{export}"
    );
    assert!(client(&db).diff(schemafile).unwrap().operations.is_empty());
}

#[test]
fn test_catalog_fallback_without_create_text() {
    let db = tidb();
    client(&db).apply(USERS).unwrap();

    let blind = db.clone().without_show_create();
    let export = client(&blind).dump().unwrap();
    let line = create_table_line(&export, "users");
    assert!(line.contains("id: :bigint, auto_random: true, default: nil"), "{line}");
    assert!(!line.contains("auto_random_base"), "{line}");
}

#[test]
fn test_failing_create_text_falls_back_to_catalog() {
    let db = tidb();
    client(&db).apply(USERS).unwrap();

    let failing = db.clone().failing_on("SHOW CREATE");
    let export = client(&failing).dump().unwrap();
    let line = create_table_line(&export, "users");
    assert!(line.contains("id: :bigint, auto_random: true, default: nil"), "{line}");
    assert!(!line.contains("options:"), "{line}");
}

#[test]
fn test_untouched_tables_are_left_alone() {
    let db = tidb();
    client(&db)
        .apply("create_table \"plain\" do |t|\n  t.string \"name\"\nend\n")
        .unwrap();
    let export = client(&db).dump().unwrap();
    assert_eq!(create_table_line(&export, "plain"), "create_table \"plain\" do |t|");
}

#[test]
fn test_schemafile_on_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(USERS.as_bytes()).unwrap();

    let tables = load_schemafile(file.path()).unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "users");
    assert!(tables[0].options.contains_key("auto_random"));

    let db = tidb();
    let text = std::fs::read_to_string(file.path()).unwrap();
    client(&db).apply(&text).unwrap();

    let out = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(out.path(), client(&db).dump().unwrap()).unwrap();
    let exported = load_schemafile(out.path()).unwrap();
    assert_eq!(
        exported[0]
            .options
            .get("auto_random_base")
            .and_then(OptionValue::as_i64),
        Some(100_000)
    );
}
