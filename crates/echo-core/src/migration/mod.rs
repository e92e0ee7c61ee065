//! Schema lifecycle: a preferred external migration tool with a built-in
//! fallback, both exposed through [`SchemaInitializer`].

pub mod liquibase;
pub mod manual;
pub mod versions;

use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;

use crate::error::StoreError;

pub use liquibase::LiquibaseMigrator;
pub use manual::ManualSchemaMigrator;
pub use versions::{SchemaMigration, current_schema_version, migration, migrations};

pub type MigrationResult<T> = Result<T, MigrationError>;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum MigrationError {
    /// The tool or its changelog could not be found.
    #[error("migration tool unavailable: {0}")]
    ToolUnavailable(String),
    /// The tool ran and reported failure.
    #[error("migration tool failed: {0}")]
    ToolFailed(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl MigrationError {
    /// Whether a later initializer may still bring the schema up to date.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ToolUnavailable(_) | Self::ToolFailed(_))
    }
}

/// Brings a store's schema to the latest version.
///
/// Implementations either fully succeed or leave the schema as they found
/// it, so the caller can fall through to another initializer.
pub trait SchemaInitializer: Send + Sync {
    fn name(&self) -> &'static str;

    fn initialize(&self, database_path: &Path, connection: &mut Connection)
    -> MigrationResult<()>;
}
