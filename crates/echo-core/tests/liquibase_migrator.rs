#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use echo_core::execution::TokioToolRunner;
use echo_core::migration::{LiquibaseMigrator, ManualSchemaMigrator, MigrationError, SchemaInitializer};
use echo_core::persistence::SchemaStore;
use echo_core::{SqliteStore, StoreConfig};
use rusqlite::Connection;
use tempfile::TempDir;

/// Writes an executable shell script standing in for the liquibase CLI.
fn fake_tool(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn changelog(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("changelog-master.xml");
    fs::write(&path, "<databaseChangeLog/>").unwrap();
    path
}

fn migrator(program: impl Into<PathBuf>, changelog: impl Into<PathBuf>) -> LiquibaseMigrator {
    LiquibaseMigrator::new(
        program,
        changelog,
        Duration::from_secs(10),
        Arc::new(TokioToolRunner),
    )
}

fn run(migrator: &LiquibaseMigrator, dir: &TempDir) -> Result<(), MigrationError> {
    let database_path = dir.path().join("echo.db");
    let mut connection = Connection::open(&database_path).unwrap();
    migrator.initialize(&database_path, &mut connection)
}

#[test]
fn missing_program_is_reported_unavailable() {
    let dir = TempDir::new().unwrap();
    let migrator = migrator("/nonexistent/liquibase", changelog(&dir));

    let error = run(&migrator, &dir).unwrap_err();
    assert!(matches!(error, MigrationError::ToolUnavailable(_)), "{error}");
    assert!(error.is_recoverable());
}

#[test]
fn failing_version_probe_is_reported_unavailable() {
    let dir = TempDir::new().unwrap();
    let program = fake_tool(&dir, "liquibase", "exit 2");
    let migrator = migrator(program, changelog(&dir));

    let error = run(&migrator, &dir).unwrap_err();
    assert!(matches!(error, MigrationError::ToolUnavailable(_)), "{error}");
}

#[test]
fn missing_changelog_is_reported_unavailable() {
    let dir = TempDir::new().unwrap();
    let program = fake_tool(&dir, "liquibase", "exit 0");
    let migrator = migrator(program, dir.path().join("absent.xml"));

    let error = run(&migrator, &dir).unwrap_err();
    match error {
        MigrationError::ToolUnavailable(message) => assert!(message.contains("absent.xml")),
        other => panic!("expected ToolUnavailable, got {other}"),
    }
}

#[test]
fn failing_update_is_reported_as_tool_failure_with_stderr() {
    let dir = TempDir::new().unwrap();
    let program = fake_tool(
        &dir,
        "liquibase",
        r#"if [ "$1" = "--version" ]; then exit 0; fi
echo "changeset 1-packages failed" >&2
exit 3"#,
    );
    let migrator = migrator(program, changelog(&dir));

    let error = run(&migrator, &dir).unwrap_err();
    match error {
        MigrationError::ToolFailed(message) => {
            assert!(message.contains("exited with code 3"), "{message}");
            assert!(message.contains("changeset 1-packages failed"), "{message}");
        }
        other => panic!("expected ToolFailed, got {other}"),
    }
}

#[test]
fn successful_update_receives_changelog_and_jdbc_url() {
    let dir = TempDir::new().unwrap();
    let args_file = dir.path().join("args.txt");
    let program = fake_tool(
        &dir,
        "liquibase",
        &format!(r#"echo "$@" >> "{}""#, args_file.display()),
    );
    let changelog = changelog(&dir);
    let migrator = migrator(program, &changelog);

    run(&migrator, &dir).unwrap();

    let invocations = fs::read_to_string(&args_file).unwrap();
    let lines: Vec<&str> = invocations.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "--version");
    assert_eq!(
        lines[1],
        format!(
            "--changeLogFile={} --url=jdbc:sqlite:{} update",
            changelog.display(),
            dir.path().join("echo.db").display()
        )
    );
}

#[test]
fn hung_update_times_out_as_tool_failure() {
    let dir = TempDir::new().unwrap();
    let program = fake_tool(
        &dir,
        "liquibase",
        r#"if [ "$1" = "--version" ]; then exit 0; fi
sleep 30"#,
    );
    let migrator = LiquibaseMigrator::new(
        program,
        changelog(&dir),
        Duration::from_millis(300),
        Arc::new(TokioToolRunner),
    );

    let error = run(&migrator, &dir).unwrap_err();
    assert!(matches!(error, MigrationError::ToolFailed(_)), "{error}");
}

#[test]
fn store_falls_back_when_update_fails() {
    let dir = TempDir::new().unwrap();
    let program = fake_tool(
        &dir,
        "liquibase",
        r#"if [ "$1" = "--version" ]; then exit 0; fi
exit 1"#,
    );
    let config = StoreConfig {
        liquibase_program: program,
        changelog_path: changelog(&dir),
        migration_timeout_secs: 10,
        ..StoreConfig::new(dir.path().join("echo.db"))
    };

    let store = SqliteStore::with_config(config);
    store.initialize().unwrap();
    assert_eq!(store.schema_version().unwrap(), 1);
}

#[test]
fn manual_migrator_is_usable_after_a_tool_failure() {
    let dir = TempDir::new().unwrap();
    let database_path = dir.path().join("echo.db");
    let mut connection = Connection::open(&database_path).unwrap();

    let error = migrator("/nonexistent/liquibase", Path::new("/nonexistent.xml"))
        .initialize(&database_path, &mut connection)
        .unwrap_err();
    assert!(error.is_recoverable());

    ManualSchemaMigrator
        .initialize(&database_path, &mut connection)
        .unwrap();
}
