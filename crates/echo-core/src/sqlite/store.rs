use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Params, Transaction, params};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreErrorKind};
use crate::migration::{
    LiquibaseMigrator, ManualSchemaMigrator, MigrationError, SchemaInitializer,
};
use crate::models::{
    InstallationRecord, Metadata, Package, Recommendation, SchemaVersion, UsagePattern,
    encode_metadata, unix_nanos,
};
use crate::persistence::{
    InstallationStore, PackageStore, PersistenceResult, RecommendationStore, SchemaStore,
    UsageStore,
};
use crate::sqlite::rows::{
    InstallationRow, PackageRow, RecommendationRow, SchemaVersionRow, UsagePatternRow,
    bool_to_sqlite, conversion_error,
};

/// One result row of [`SqliteStore::query`], keyed by column name.
pub type QueryRow = BTreeMap<String, Value>;

/// SQLite-backed gateway for packages, usage telemetry, recommendations and
/// installation history.
///
/// Holds a single connection, opened on first use and released by
/// [`SqliteStore::close`]. Every mutating call commits before returning.
pub struct SqliteStore {
    database_path: PathBuf,
    connection: Mutex<Option<Connection>>,
    preferred: Option<Box<dyn SchemaInitializer>>,
    fallback: Box<dyn SchemaInitializer>,
}

impl SqliteStore {
    /// Store at `database_path` with default settings otherwise.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self::with_config(StoreConfig::new(database_path))
    }

    pub fn with_config(config: StoreConfig) -> Self {
        let preferred: Option<Box<dyn SchemaInitializer>> = if config.prefer_migration_tool {
            Some(Box::new(LiquibaseMigrator::from_config(&config)))
        } else {
            None
        };
        Self::with_initializers(config, preferred, Box::new(ManualSchemaMigrator))
    }

    pub fn with_initializers(
        config: StoreConfig,
        preferred: Option<Box<dyn SchemaInitializer>>,
        fallback: Box<dyn SchemaInitializer>,
    ) -> Self {
        Self {
            database_path: config.resolved_database_path(),
            connection: Mutex::new(None),
            preferred,
            fallback,
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn is_open(&self) -> bool {
        self.connection
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Releases the connection. Safe to call repeatedly, and before any
    /// connection was opened; the next operation reopens it.
    pub fn close(&self) -> PersistenceResult<()> {
        let mut slot = self.lock_connection("close")?;
        if let Some(connection) = slot.take() {
            connection
                .close()
                .map_err(|(_, error)| StoreError::storage("close", error))?;
            tracing::debug!(path = %self.database_path.display(), "closed database connection");
        }
        Ok(())
    }

    /// Runs one mutating statement and commits it.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> PersistenceResult<()> {
        self.with_connection("execute", |connection| {
            let changed = connection.execute(sql, params)?;
            tracing::debug!(sql = sql.trim(), changed, "executed statement");
            Ok(())
        })
    }

    /// Runs one read statement and returns its rows in result order.
    pub fn query<P: Params>(&self, sql: &str, params: P) -> PersistenceResult<Vec<QueryRow>> {
        self.with_connection("query", |connection| {
            let mut statement = connection.prepare(sql)?;
            let columns: Vec<String> = statement
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();

            let rows = statement.query_map(params, |row| {
                let mut mapped = QueryRow::new();
                for (index, column) in columns.iter().enumerate() {
                    mapped.insert(column.clone(), row.get::<_, Value>(index)?);
                }
                Ok(mapped)
            })?;

            let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            tracing::debug!(sql = sql.trim(), rows = rows.len(), "executed query");
            Ok(rows)
        })
    }

    fn lock_connection(
        &self,
        operation_name: &str,
    ) -> PersistenceResult<MutexGuard<'_, Option<Connection>>> {
        self.connection.lock().map_err(|_| {
            StoreError::new(
                StoreErrorKind::Storage,
                operation_name,
                "database connection lock poisoned",
            )
        })
    }

    fn with_open_connection<T, E>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut slot = self.lock_connection(operation_name)?;
        if slot.is_none() {
            let connection = open_connection(&self.database_path)
                .map_err(|error| StoreError::storage(operation_name, error))?;
            tracing::debug!(path = %self.database_path.display(), "opened database connection");
            *slot = Some(connection);
        }

        let connection = slot.as_mut().ok_or_else(|| {
            StoreError::new(
                StoreErrorKind::Storage,
                operation_name,
                "database connection unavailable",
            )
        })?;
        operation(connection)
    }

    fn with_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        self.with_open_connection(operation_name, |connection| {
            operation(connection).map_err(|error| StoreError::storage(operation_name, error))
        })
    }

    fn run_initializer(&self, initializer: &dyn SchemaInitializer) -> Result<(), MigrationError> {
        self.with_open_connection("initialize", |connection| {
            initializer.initialize(&self.database_path, connection)
        })
    }
}

impl SchemaStore for SqliteStore {
    fn initialize(&self) -> PersistenceResult<()> {
        tracing::info!(path = %self.database_path.display(), "initializing database");

        if let Some(preferred) = &self.preferred {
            match self.run_initializer(preferred.as_ref()) {
                Ok(()) => return Ok(()),
                Err(error) if error.is_recoverable() => {
                    tracing::warn!(
                        initializer = preferred.name(),
                        error = %error,
                        "preferred schema initializer unavailable; falling back to {}",
                        self.fallback.name()
                    );
                }
                Err(error) => return Err(migration_error(error)),
            }
        }

        self.run_initializer(self.fallback.as_ref())
            .map_err(migration_error)
    }

    fn schema_version(&self) -> PersistenceResult<i64> {
        self.with_connection("schema_version", |connection| {
            let version = connection.query_row(
                "SELECT MAX(version) FROM database_version",
                [],
                |row| row.get::<_, Option<i64>>(0),
            );
            match version {
                Ok(version) => Ok(version.unwrap_or(0)),
                Err(error) if is_missing_table(&error) => Ok(0),
                Err(error) => Err(error),
            }
        })
    }

    fn schema_versions(&self) -> PersistenceResult<Vec<SchemaVersion>> {
        self.with_connection("schema_versions", |connection| {
            let mut statement =
                match connection.prepare(&format!("{} ORDER BY version", SchemaVersionRow::SELECT)) {
                    Ok(statement) => statement,
                    Err(error) if is_missing_table(&error) => return Ok(Vec::new()),
                    Err(error) => return Err(error),
                };
            let rows = statement.query_map([], SchemaVersionRow::from_row)?;
            rows.map(|row| row.and_then(SchemaVersionRow::into_schema_version))
                .collect()
        })
    }
}

impl PackageStore for SqliteStore {
    fn upsert_package(&self, package: &Package) -> PersistenceResult<()> {
        self.with_connection("upsert_package", |connection| {
            let metadata = metadata_to_sqlite(&package.metadata)?;
            let transaction = connection.transaction()?;

            transaction.execute(
                "
INSERT INTO packages (
    name, version, description, installed_date, source, size, metadata
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(name) DO UPDATE SET
    version = excluded.version,
    description = excluded.description,
    installed_date = excluded.installed_date,
    source = excluded.source,
    size = excluded.size,
    metadata = excluded.metadata
",
                params![
                    package.name.as_str(),
                    package.version.as_str(),
                    package.description.as_deref(),
                    package.installed_date.map(to_unix_nanos).transpose()?,
                    package.source.as_deref(),
                    package.size.map(to_i64).transpose()?,
                    metadata,
                ],
            )?;

            replace_children(
                &transaction,
                "package_dependencies",
                "dependency_name",
                &package.name,
                &package.dependencies,
            )?;
            replace_children(
                &transaction,
                "package_tags",
                "tag",
                &package.name,
                &package.tags,
            )?;

            transaction.commit()
        })
    }

    fn get_package(&self, name: &str) -> PersistenceResult<Option<Package>> {
        self.with_connection("get_package", |connection| {
            let row = connection
                .query_row(
                    &format!("{} WHERE name = ?1", PackageRow::SELECT),
                    [name],
                    PackageRow::from_row,
                )
                .optional()?;

            row.map(|row| load_package(connection, row)).transpose()
        })
    }

    fn list_packages(&self) -> PersistenceResult<Vec<Package>> {
        self.with_connection("list_packages", |connection| {
            let rows = {
                let mut statement = connection.prepare(PackageRow::SELECT)?;
                let rows = statement.query_map([], PackageRow::from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            rows.into_iter()
                .map(|row| load_package(connection, row))
                .collect()
        })
    }
}

impl UsageStore for SqliteStore {
    fn upsert_usage_pattern(&self, pattern: &UsagePattern) -> PersistenceResult<()> {
        self.with_connection("upsert_usage_pattern", |connection| {
            let metadata = metadata_to_sqlite(&pattern.metadata)?;
            let transaction = connection.transaction()?;

            transaction.execute(
                "
INSERT INTO usage_patterns (
    package_name, frequency, last_used, importance_score, metadata
) VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(package_name) DO UPDATE SET
    frequency = excluded.frequency,
    last_used = excluded.last_used,
    importance_score = excluded.importance_score,
    metadata = excluded.metadata
",
                params![
                    pattern.package_name.as_str(),
                    to_i64(pattern.frequency)?,
                    to_unix_nanos(pattern.last_used)?,
                    pattern.importance_score,
                    metadata,
                ],
            )?;

            replace_children(
                &transaction,
                "usage_contexts",
                "context",
                &pattern.package_name,
                &pattern.usage_contexts,
            )?;

            transaction.commit()
        })
    }

    fn list_usage_patterns(&self) -> PersistenceResult<Vec<UsagePattern>> {
        self.with_connection("list_usage_patterns", |connection| {
            let rows = {
                let mut statement = connection.prepare(&format!(
                    "{} ORDER BY frequency DESC",
                    UsagePatternRow::SELECT
                ))?;
                let rows = statement.query_map([], UsagePatternRow::from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            rows.into_iter()
                .map(|row| {
                    let contexts = read_children(
                        connection,
                        "usage_contexts",
                        "context",
                        row.package_name(),
                    )?;
                    row.into_usage_pattern(contexts)
                })
                .collect()
        })
    }
}

impl RecommendationStore for SqliteStore {
    fn add_recommendation(&self, recommendation: &Recommendation) -> PersistenceResult<i64> {
        self.with_connection("add_recommendation", |connection| {
            let metadata = metadata_to_sqlite(&recommendation.metadata)?;
            connection.execute(
                "
INSERT INTO recommendations (
    package_name, score, reason, category, timestamp, source, metadata
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
",
                params![
                    recommendation.package_name.as_str(),
                    recommendation.score,
                    recommendation.reason.as_str(),
                    recommendation.category.as_str(),
                    to_unix_nanos(recommendation.timestamp)?,
                    recommendation.source.as_str(),
                    metadata,
                ],
            )?;
            Ok(connection.last_insert_rowid())
        })
    }

    fn list_recommendations(
        &self,
        limit: usize,
        source: Option<&str>,
    ) -> PersistenceResult<Vec<Recommendation>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.with_connection("list_recommendations", |connection| {
            let limit = to_i64(limit)?;
            let rows = match source {
                Some(source) => {
                    let mut statement = connection.prepare(&format!(
                        "{} WHERE source = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
                        RecommendationRow::SELECT
                    ))?;
                    let rows = statement.query_map(params![source, limit], RecommendationRow::from_row)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let mut statement = connection.prepare(&format!(
                        "{} ORDER BY timestamp DESC, id DESC LIMIT ?1",
                        RecommendationRow::SELECT
                    ))?;
                    let rows = statement.query_map([limit], RecommendationRow::from_row)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
            };

            rows.into_iter()
                .map(RecommendationRow::into_recommendation)
                .collect()
        })
    }
}

impl InstallationStore for SqliteStore {
    fn record_installation(&self, record: &InstallationRecord) -> PersistenceResult<i64> {
        self.with_connection("record_installation", |connection| {
            connection.execute(
                "
INSERT INTO installation_history (
    package_name, operation, timestamp, success, details
) VALUES (?1, ?2, ?3, ?4, ?5)
",
                params![
                    record.package_name.as_str(),
                    record.operation.as_str(),
                    to_unix_nanos(record.timestamp)?,
                    bool_to_sqlite(record.success),
                    record.details.as_deref(),
                ],
            )?;
            Ok(connection.last_insert_rowid())
        })
    }

    fn list_installation_history(
        &self,
        limit: usize,
        package_name: Option<&str>,
    ) -> PersistenceResult<Vec<InstallationRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.with_connection("list_installation_history", |connection| {
            let limit = to_i64(limit)?;
            let rows = match package_name {
                Some(package_name) => {
                    let mut statement = connection.prepare(&format!(
                        "{} WHERE package_name = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
                        InstallationRow::SELECT
                    ))?;
                    let rows =
                        statement.query_map(params![package_name, limit], InstallationRow::from_row)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let mut statement = connection.prepare(&format!(
                        "{} ORDER BY timestamp DESC, id DESC LIMIT ?1",
                        InstallationRow::SELECT
                    ))?;
                    let rows = statement.query_map([limit], InstallationRow::from_row)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
            };

            rows.into_iter().map(InstallationRow::into_record).collect()
        })
    }
}

fn open_connection(database_path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
    }
    Connection::open(database_path)
}

fn load_package(connection: &Connection, row: PackageRow) -> rusqlite::Result<Package> {
    let dependencies = read_children(
        connection,
        "package_dependencies",
        "dependency_name",
        row.name(),
    )?;
    let tags = read_children(connection, "package_tags", "tag", row.name())?;
    row.into_package(dependencies, tags)
}

/// Replaces every child row owned by `package_name` in `table`.
fn replace_children<'a>(
    transaction: &Transaction<'_>,
    table: &str,
    column: &str,
    package_name: &str,
    values: impl IntoIterator<Item = &'a String>,
) -> rusqlite::Result<()> {
    transaction.execute(
        &format!("DELETE FROM {table} WHERE package_name = ?1"),
        [package_name],
    )?;

    let mut statement = transaction.prepare(&format!(
        "INSERT INTO {table} (package_name, {column}) VALUES (?1, ?2)"
    ))?;
    for value in values {
        statement.execute((package_name, value.as_str()))?;
    }
    Ok(())
}

fn read_children(
    connection: &Connection,
    table: &str,
    column: &str,
    package_name: &str,
) -> rusqlite::Result<BTreeSet<String>> {
    let mut statement = connection.prepare_cached(&format!(
        "SELECT {column} FROM {table} WHERE package_name = ?1"
    ))?;
    let rows = statement.query_map([package_name], |row| row.get(0))?;
    rows.collect()
}

fn metadata_to_sqlite(metadata: &Metadata) -> rusqlite::Result<Option<String>> {
    encode_metadata(metadata).map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))
}

fn is_missing_table(error: &rusqlite::Error) -> bool {
    let (failure, message) = match error {
        rusqlite::Error::SqliteFailure(failure, Some(message)) => (failure, message),
        rusqlite::Error::SqlInputError { error, msg, .. } => (error, msg),
        _ => return false,
    };
    failure.code == ErrorCode::Unknown && message.starts_with("no such table")
}

fn migration_error(error: MigrationError) -> StoreError {
    match error {
        MigrationError::Storage(error) => error,
        other => StoreError::new(StoreErrorKind::Migration, "initialize", other.to_string()),
    }
}

fn to_unix_nanos(value: SystemTime) -> rusqlite::Result<i64> {
    unix_nanos(value).ok_or_else(|| {
        conversion_error("timestamps before the unix epoch or after 2262 are not supported")
    })
}

fn to_i64<T: TryInto<i64>>(value: T) -> rusqlite::Result<i64> {
    value
        .try_into()
        .map_err(|_| conversion_error("value exceeds i64 range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_is_recognized_from_the_sqlite_failure() {
        let connection = Connection::open_in_memory().unwrap();

        let missing = connection
            .query_row("SELECT MAX(version) FROM database_version", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .unwrap_err();
        assert!(is_missing_table(&missing), "{missing:?}");

        let syntax = connection.execute("SELEC 1", []).unwrap_err();
        assert!(!is_missing_table(&syntax));

        let conversion = conversion_error("no such table: mentioned in text only");
        assert!(!is_missing_table(&conversion));
    }
}
