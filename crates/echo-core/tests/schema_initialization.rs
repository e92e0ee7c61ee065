use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use echo_core::migration::{
    ManualSchemaMigrator, MigrationError, MigrationResult, SchemaInitializer,
};
use echo_core::persistence::SchemaStore;
use echo_core::{SqliteStore, StoreConfig, StoreError, StoreErrorKind};
use rusqlite::Connection;
use tempfile::TempDir;

#[derive(Clone, Copy)]
enum Outcome {
    Succeed,
    Unavailable,
    Failed,
    StorageFault,
}

struct ScriptedInitializer {
    outcome: Outcome,
    calls: Arc<AtomicUsize>,
}

impl ScriptedInitializer {
    fn boxed(outcome: Outcome, calls: &Arc<AtomicUsize>) -> Box<dyn SchemaInitializer> {
        Box::new(Self {
            outcome,
            calls: calls.clone(),
        })
    }
}

impl SchemaInitializer for ScriptedInitializer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn initialize(&self, _database_path: &Path, _connection: &mut Connection) -> MigrationResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Unavailable => Err(MigrationError::ToolUnavailable("not on PATH".into())),
            Outcome::Failed => Err(MigrationError::ToolFailed("exit code 1".into())),
            Outcome::StorageFault => Err(MigrationError::Storage(StoreError::new(
                StoreErrorKind::Storage,
                "scripted",
                "disk I/O error",
            ))),
        }
    }
}

struct CountingFallback {
    calls: Arc<AtomicUsize>,
}

impl SchemaInitializer for CountingFallback {
    fn name(&self) -> &'static str {
        "counting-manual"
    }

    fn initialize(&self, database_path: &Path, connection: &mut Connection) -> MigrationResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ManualSchemaMigrator.initialize(database_path, connection)
    }
}

fn store_with(dir: &TempDir, preferred: Outcome) -> (SqliteStore, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let preferred_calls = Arc::new(AtomicUsize::new(0));
    let fallback_calls = Arc::new(AtomicUsize::new(0));
    let store = SqliteStore::with_initializers(
        StoreConfig::new(dir.path().join("echo.db")),
        Some(ScriptedInitializer::boxed(preferred, &preferred_calls)),
        Box::new(CountingFallback {
            calls: fallback_calls.clone(),
        }),
    );
    (store, preferred_calls, fallback_calls)
}

#[test]
fn successful_preferred_initializer_skips_fallback() {
    let dir = TempDir::new().unwrap();
    let (store, preferred, fallback) = store_with(&dir, Outcome::Succeed);

    store.initialize().unwrap();
    assert_eq!(preferred.load(Ordering::SeqCst), 1);
    assert_eq!(fallback.load(Ordering::SeqCst), 0);
}

#[test]
fn unavailable_tool_falls_back_to_manual_schema() {
    let dir = TempDir::new().unwrap();
    let (store, preferred, fallback) = store_with(&dir, Outcome::Unavailable);

    store.initialize().unwrap();
    assert_eq!(preferred.load(Ordering::SeqCst), 1);
    assert_eq!(fallback.load(Ordering::SeqCst), 1);
    assert_eq!(store.schema_version().unwrap(), 1);
}

#[test]
fn failing_tool_falls_back_to_manual_schema() {
    let dir = TempDir::new().unwrap();
    let (store, _, fallback) = store_with(&dir, Outcome::Failed);

    store.initialize().unwrap();
    assert_eq!(fallback.load(Ordering::SeqCst), 1);
    assert_eq!(store.schema_version().unwrap(), 1);
}

#[test]
fn storage_fault_in_preferred_initializer_propagates() {
    let dir = TempDir::new().unwrap();
    let (store, _, fallback) = store_with(&dir, Outcome::StorageFault);

    let error = store.initialize().unwrap_err();
    assert_eq!(error.kind, StoreErrorKind::Storage);
    assert_eq!(fallback.load(Ordering::SeqCst), 0);
}

#[test]
fn fallback_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let store = SqliteStore::with_initializers(
        StoreConfig::new(dir.path().join("echo.db")),
        Some(ScriptedInitializer::boxed(Outcome::Unavailable, &calls)),
        ScriptedInitializer::boxed(Outcome::Failed, &calls),
    );

    let error = store.initialize().unwrap_err();
    assert_eq!(error.kind, StoreErrorKind::Migration);
    assert_eq!(error.operation, "initialize");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn manual_only_store_never_consults_a_tool() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::with_initializers(
        StoreConfig::new(dir.path().join("echo.db")),
        None,
        Box::new(ManualSchemaMigrator),
    );

    store.initialize().unwrap();
    assert_eq!(store.schema_version().unwrap(), 1);
}
