use std::path::{Path, PathBuf};
use std::time::Duration;

use config::Config;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreErrorKind};

pub const ENV_PREFIX: &str = "ECHO";
pub const DEFAULT_DATABASE_FILE: &str = "echo.db";
pub const DEFAULT_MIGRATION_TIMEOUT_SECS: u64 = 120;

/// Settings for opening and initializing an Echo store.
///
/// Loaded from an optional TOML file, then `ECHO_*` environment variables
/// (`ECHO_DATABASE_PATH`, `ECHO_LIQUIBASE_PROGRAM`, ...).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file. A leading `~` expands to the home directory.
    pub database_path: PathBuf,
    pub liquibase_program: PathBuf,
    pub changelog_path: PathBuf,
    pub migration_timeout_secs: u64,
    /// When false, initialization goes straight to the built-in schema.
    pub prefer_migration_tool: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join(DEFAULT_DATABASE_FILE),
            liquibase_program: PathBuf::from("liquibase"),
            changelog_path: default_changelog_path(),
            migration_timeout_secs: DEFAULT_MIGRATION_TIMEOUT_SECS,
            prefer_migration_tool: true,
        }
    }
}

impl StoreConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    pub fn load(path: Option<&Path>) -> Result<Self, StoreError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let settings = builder
            .build()
            .map_err(|error| config_error(format!("failed to build configuration: {error}")))?;

        settings
            .try_deserialize::<StoreConfig>()
            .map_err(|error| config_error(format!("failed to deserialize configuration: {error}")))
    }

    pub fn without_migration_tool(mut self) -> Self {
        self.prefer_migration_tool = false;
        self
    }

    pub fn migration_timeout(&self) -> Duration {
        Duration::from_secs(self.migration_timeout_secs)
    }

    pub fn resolved_database_path(&self) -> PathBuf {
        expand_home(&self.database_path)
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".echo")
}

/// Changelog shipped alongside this crate.
pub fn default_changelog_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("migrations")
        .join("changelog-master.xml")
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn config_error(message: String) -> StoreError {
    StoreError::new(StoreErrorKind::Config, "load_config", message)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_prefer_the_migration_tool() {
        let config = StoreConfig::default();
        assert!(config.prefer_migration_tool);
        assert_eq!(config.liquibase_program, PathBuf::from("liquibase"));
        assert!(config.changelog_path.ends_with("migrations/changelog-master.xml"));
        assert!(config.database_path.ends_with(".echo/echo.db"));
    }

    #[test]
    fn tilde_expands_against_home_directory() {
        let config = StoreConfig::new("~/data/echo.db");
        let resolved = config.resolved_database_path();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolved, home.join("data/echo.db"));
        }

        let absolute = StoreConfig::new("/var/lib/echo.db");
        assert_eq!(
            absolute.resolved_database_path(),
            PathBuf::from("/var/lib/echo.db")
        );
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "database_path = \"/tmp/echo-config-test.db\"\nmigration_timeout_secs = 5\nprefer_migration_tool = false"
        )
        .unwrap();

        let config = StoreConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/echo-config-test.db"));
        assert_eq!(config.migration_timeout(), Duration::from_secs(5));
        assert!(!config.prefer_migration_tool);
        assert_eq!(config.liquibase_program, PathBuf::from("liquibase"));
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let error = StoreConfig::load(Some(Path::new("/nonexistent/echo.toml"))).unwrap_err();
        assert_eq!(error.kind, StoreErrorKind::Config);
    }
}
