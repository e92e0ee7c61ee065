use echo_core::migration::versions::SCHEMA_TABLES;
use echo_core::migration::{current_schema_version, migration, migrations};

#[test]
fn migration_versions_are_strictly_increasing() {
    let entries = migrations();
    assert!(!entries.is_empty());

    let mut previous = 0;
    for entry in entries {
        assert!(entry.version > previous);
        previous = entry.version;
    }
}

#[test]
fn migration_lookup_and_schema_version_are_consistent() {
    let latest = current_schema_version();
    let latest_entry = migration(latest).expect("latest migration must exist");
    assert_eq!(latest_entry.version, latest);
    assert!(migration(latest + 1).is_none());
}

#[test]
fn first_migration_is_the_bootstrap_version() {
    let first = &migrations()[0];
    assert_eq!(first.version, 1);
    assert_eq!(first.description, "Initial schema creation");
}

#[test]
fn migration_sql_is_idempotent_ddl() {
    for entry in migrations() {
        assert!(!entry.up_sql.trim().is_empty(), "up sql must not be empty");
        for statement in entry.up_sql.split(';').map(str::trim) {
            if statement.starts_with("CREATE") {
                assert!(
                    statement.contains("IF NOT EXISTS"),
                    "statement must be re-runnable: {statement}"
                );
            }
        }
    }
}

#[test]
fn bootstrap_migration_creates_every_schema_table() {
    let ddl = migrations()
        .iter()
        .map(|entry| entry.up_sql)
        .collect::<String>();
    for table in SCHEMA_TABLES {
        assert!(
            ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
            "missing DDL for {table}"
        );
    }
}

#[test]
fn shipped_changelog_covers_every_schema_table() {
    let changelog = std::fs::read_to_string(echo_core::config::default_changelog_path())
        .expect("changelog ships with the crate");
    for table in SCHEMA_TABLES {
        assert!(
            changelog.contains(&format!("tableName=\"{table}\""))
                || changelog.contains(&format!("CREATE TABLE {table} (")),
            "changelog does not create {table}"
        );
    }
    assert!(changelog.contains("INSERT OR IGNORE INTO database_version"));
}
