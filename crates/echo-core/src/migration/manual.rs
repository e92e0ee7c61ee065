use std::path::Path;
use std::time::SystemTime;

use rusqlite::Connection;

use crate::error::StoreError;
use crate::migration::versions::{SchemaMigration, migrations};
use crate::migration::{MigrationResult, SchemaInitializer};
use crate::models::unix_nanos;

const OPERATION: &str = "manual_schema_migration";

/// Creates the schema from the embedded DDL. Every statement is
/// `IF NOT EXISTS` and version rows use `INSERT OR IGNORE`, so running it
/// against an already-initialized store is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualSchemaMigrator;

impl SchemaInitializer for ManualSchemaMigrator {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn initialize(
        &self,
        database_path: &Path,
        connection: &mut Connection,
    ) -> MigrationResult<()> {
        for migration in migrations() {
            apply_migration(connection, migration)
                .map_err(|error| StoreError::storage(OPERATION, error))?;
            tracing::debug!(
                version = migration.version,
                name = migration.name,
                "applied schema migration"
            );
        }

        tracing::info!(
            path = %database_path.display(),
            "database schema initialized manually"
        );
        Ok(())
    }
}

fn apply_migration(
    connection: &mut Connection,
    migration: &SchemaMigration,
) -> rusqlite::Result<()> {
    let applied_at = unix_nanos(SystemTime::now()).unwrap_or_default();

    let transaction = connection.transaction()?;
    transaction.execute_batch(migration.up_sql)?;
    transaction.execute(
        "INSERT OR IGNORE INTO database_version (version, applied_at, description)
         VALUES (?1, ?2, ?3)",
        (migration.version, applied_at, migration.description),
    )?;
    transaction.commit()
}
