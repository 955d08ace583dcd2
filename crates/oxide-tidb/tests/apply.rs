//! Apply-path integration tests against the in-memory database.

mod common;

use common::{client, mysql, tidb};
use oxide_schema::MigrationOperation;
use oxide_tidb::TidbError;

const USERS: &str = r#"
create_table "users", auto_random: 5, auto_random_base: 100000, options: "ENGINE=InnoDB" do |t|
  t.string "name", null: false
end
"#;

const EVENTS: &str = r#"
create_table "events", id: false do |t|
  t.bigint "id", primary_key: true, null: false, auto_random: 6
  t.string "kind"
end
"#;

#[test]
fn test_users_table_ddl() {
    let db = tidb();
    let statements = client(&db).apply(USERS).unwrap();

    assert_eq!(statements.len(), 1);
    let ddl = &statements[0];
    assert!(ddl.contains("`id` bigint NOT NULL AUTO_RANDOM(5)"), "{ddl}");
    assert!(!ddl.contains("AUTO_INCREMENT"), "{ddl}");
    assert!(ddl.contains("PRIMARY KEY (`id`)"), "{ddl}");
    assert!(ddl.ends_with(") AUTO_RANDOM_BASE=100000 ENGINE=InnoDB"), "{ddl}");
    assert_eq!(db.executed(), statements);
}

#[test]
fn test_users_table_is_idempotent() {
    let db = tidb();
    client(&db).apply(USERS).unwrap();

    let mut client = client(&db);
    let diff = client.diff(USERS).unwrap();
    assert!(diff.operations.is_empty(), "{diff}");
    assert!(client.apply(USERS).unwrap().is_empty());
}

#[test]
fn test_explicit_primary_key_column() {
    let db = tidb();
    let statements = client(&db).apply(EVENTS).unwrap();

    let ddl = &statements[0];
    assert!(ddl.contains("`id` bigint NOT NULL AUTO_RANDOM(6)"), "{ddl}");
    assert!(ddl.contains("`kind` varchar(255)"), "{ddl}");
    assert!(ddl.contains("PRIMARY KEY (`id`)"), "{ddl}");

    let mut client = client(&db);
    let diff = client.diff(EVENTS).unwrap();
    assert!(diff.is_empty(), "{diff}");
    assert!(!diff
        .operations
        .iter()
        .any(|op| matches!(op, MigrationOperation::AddColumn { .. })));
    assert!(client.apply(EVENTS).unwrap().is_empty());
}

#[test]
fn test_column_value_beats_table_level_value() {
    let schemafile = r#"
create_table "events", id: false, auto_random: 3 do |t|
  t.bigint "id", primary_key: true, auto_random: 6
end
"#;
    let db = tidb();
    let statements = client(&db).apply(schemafile).unwrap();
    assert!(statements[0].contains("AUTO_RANDOM(6)"), "{}", statements[0]);
    assert!(!statements[0].contains("AUTO_RANDOM(3)"), "{}", statements[0]);
}

#[test]
fn test_id_hash_beats_table_level_value() {
    let schemafile = r#"
create_table "users", id: { type: :bigint, auto_random: 3 }, auto_random: 5 do |t|
  t.string "name"
end
"#;
    let db = tidb();
    let statements = client(&db).apply(schemafile).unwrap();
    assert!(statements[0].contains("`id` bigint NOT NULL AUTO_RANDOM(3)"), "{}", statements[0]);
    assert!(!statements[0].contains("AUTO_RANDOM(5)"), "{}", statements[0]);
}

#[test]
fn test_table_level_value_needs_the_implicit_identity() {
    let db = tidb();
    let statements = client(&db)
        .apply(
            r#"
create_table "seqs", id: false, auto_random: 5 do |t|
  t.bigint "seq", primary_key: true
end

create_table "codes", id: false, auto_random: 5 do |t|
  t.string "code", primary_key: true
end
"#,
        )
        .unwrap();

    assert_eq!(statements.len(), 2);
    for ddl in &statements {
        assert!(!ddl.contains("AUTO_RANDOM"), "{ddl}");
    }
    assert!(statements[0].contains("`seq` bigint"), "{}", statements[0]);
    assert!(statements[1].contains("`code` varchar(255)"), "{}", statements[1]);
}

#[test]
fn test_bare_attribute_and_integer_identity() {
    let schemafile = r#"
create_table "tokens", id: :integer, auto_random: true do |t|
end
"#;
    let db = tidb();
    let statements = client(&db).apply(schemafile).unwrap();
    assert!(statements[0].contains("`id` int NOT NULL AUTO_RANDOM,"), "{}", statements[0]);
}

#[test]
fn test_stash_does_not_leak_into_next_table() {
    let schemafile = r#"
create_table "a_users", auto_random: 5 do |t|
end

create_table "b_logs", id: false do |t|
  t.bigint "seq", primary_key: true
end
"#;
    let db = tidb();
    let statements = client(&db).apply(schemafile).unwrap();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].contains("AUTO_RANDOM(5)"));
    assert!(!statements[1].contains("AUTO_RANDOM"), "{}", statements[1]);
}

#[test]
fn test_text_column_is_rejected() {
    let schemafile = r#"
create_table "posts", id: false do |t|
  t.text "body", primary_key: true, auto_random: true
end
"#;
    let db = tidb();
    let err = client(&db).apply(schemafile).unwrap_err();
    assert!(
        matches!(
            err.extension::<TidbError>(),
            Some(TidbError::ConstraintViolation { table, column, .. })
                if table == "posts" && column == "body"
        ),
        "{err}"
    );
    assert!(db.executed().is_empty());
}

#[test]
fn test_disabled_primary_key_is_rejected() {
    let schemafile = r#"
create_table "posts", id: false do |t|
  t.bigint "uid", primary_key: false, auto_random: 5
end
"#;
    let db = tidb();
    let err = client(&db).apply(schemafile).unwrap_err();
    assert!(
        matches!(
            err.extension::<TidbError>(),
            Some(TidbError::ConstraintViolation { column, .. }) if column == "uid"
        ),
        "{err}"
    );
    assert!(db.executed().is_empty());
}

#[test]
fn test_invalid_bit_width_is_rejected() {
    let schemafile = r#"
create_table "users", auto_random: 0 do |t|
end
"#;
    let err = client(&tidb()).apply(schemafile).unwrap_err();
    assert!(matches!(
        err.extension::<TidbError>(),
        Some(TidbError::ConstraintViolation { .. })
    ));
}

#[test]
fn test_add_column_to_keyless_table() {
    let db = tidb();
    client(&db)
        .apply("create_table \"logs\", id: false do |t|\n  t.text \"body\"\nend\n")
        .unwrap();

    let schemafile = r#"
create_table "logs", id: false do |t|
  t.text "body"
  t.bigint "uid", null: false, primary_key: true, auto_random: 5
end
"#;
    let statements = client(&db).apply(schemafile).unwrap();
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE `logs` ADD COLUMN `uid` bigint NOT NULL",
            "ALTER TABLE `logs` MODIFY COLUMN `uid` BIGINT AUTO_RANDOM(5) PRIMARY KEY",
        ]
    );

    let export = client(&db).dump().unwrap();
    assert!(
        export.contains("t.bigint \"uid\", null: false, primary_key: true, auto_random: 5"),
        "{export}"
    );
    assert!(client(&db).apply(schemafile).unwrap().is_empty());
}

#[test]
fn test_add_column_to_table_with_primary_key_is_rejected() {
    let db = tidb();
    client(&db)
        .apply("create_table \"users\" do |t|\n  t.string \"name\"\nend\n")
        .unwrap();
    db.clear_log();

    let schemafile = r#"
create_table "users" do |t|
  t.string "name"
  t.bigint "uid", auto_random: 5
end
"#;
    let err = client(&db).apply(schemafile).unwrap_err();
    assert!(
        matches!(
            err.extension::<TidbError>(),
            Some(TidbError::ConstraintViolation { table, column, .. })
                if table == "users" && column == "uid"
        ),
        "{err}"
    );
    assert!(db.executed().is_empty());
}

#[test]
fn test_mysql_ignores_the_options() {
    let db = mysql();
    let statements = client(&db).apply(USERS).unwrap();

    let ddl = &statements[0];
    assert!(ddl.contains("`id` bigint NOT NULL AUTO_INCREMENT"), "{ddl}");
    assert!(!ddl.contains("AUTO_RANDOM"), "{ddl}");
    assert!(ddl.ends_with(") ENGINE=InnoDB"), "{ddl}");

    let mut client = client(&db);
    let export = client.dump().unwrap();
    assert!(!export.contains("auto_random"), "{export}");
    assert!(client.diff(USERS).unwrap().is_empty());
}

#[test]
fn test_dry_run_executes_nothing() {
    let db = tidb();
    let statements = client(&db).dry_run(true).apply(USERS).unwrap();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].contains("AUTO_RANDOM(5)"));
    assert!(db.executed().is_empty());
    assert!(db.table_names().is_empty());
}
