use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;

use crate::config::StoreConfig;
use crate::execution::{
    TokioToolRunner, ToolCommand, ToolExit, ToolInvocation, ToolOutput, ToolRunner, run_validated,
};
use crate::migration::{MigrationError, MigrationResult, SchemaInitializer};

const PROBE_OPERATION: &str = "liquibase_probe";
const UPDATE_OPERATION: &str = "liquibase_update";
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const STDERR_TAIL_CHARS: usize = 2048;

/// Applies the versioned changelog with the Liquibase CLI.
pub struct LiquibaseMigrator {
    program: PathBuf,
    changelog_path: PathBuf,
    timeout: Duration,
    runner: Arc<dyn ToolRunner>,
}

impl LiquibaseMigrator {
    pub fn new(
        program: impl Into<PathBuf>,
        changelog_path: impl Into<PathBuf>,
        timeout: Duration,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            program: program.into(),
            changelog_path: changelog_path.into(),
            timeout,
            runner,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            config.liquibase_program.clone(),
            config.changelog_path.clone(),
            config.migration_timeout(),
            Arc::new(TokioToolRunner),
        )
    }

    pub fn changelog_path(&self) -> &Path {
        &self.changelog_path
    }

    pub fn probe(&self) -> MigrationResult<()> {
        let invocation = ToolInvocation::new(
            PROBE_OPERATION,
            ToolCommand::new(&self.program).arg("--version"),
            PROBE_TIMEOUT.min(self.timeout),
        );

        let output = run_validated(self.runner.as_ref(), &invocation)
            .map_err(|error| MigrationError::ToolUnavailable(error.to_string()))?;

        if output.succeeded() {
            Ok(())
        } else {
            Err(MigrationError::ToolUnavailable(format!(
                "'{} --version' {}",
                self.program.display(),
                describe_failure(&output)
            )))
        }
    }

    pub fn update_command(&self, database_path: &Path) -> ToolCommand {
        ToolCommand::new(&self.program).args([
            format!("--changeLogFile={}", self.changelog_path.display()),
            format!("--url={}", connection_url(database_path)),
            "update".to_string(),
        ])
    }
}

impl SchemaInitializer for LiquibaseMigrator {
    fn name(&self) -> &'static str {
        "liquibase"
    }

    fn initialize(
        &self,
        database_path: &Path,
        _connection: &mut Connection,
    ) -> MigrationResult<()> {
        self.probe()?;

        if !self.changelog_path.is_file() {
            return Err(MigrationError::ToolUnavailable(format!(
                "changelog not found: {}",
                self.changelog_path.display()
            )));
        }

        let command = self.update_command(database_path);
        tracing::info!(command = %command.display(), "running liquibase update");

        let invocation = ToolInvocation::new(UPDATE_OPERATION, command, self.timeout);
        let output = run_validated(self.runner.as_ref(), &invocation)
            .map_err(|error| MigrationError::ToolFailed(error.to_string()))?;

        if !output.succeeded() {
            return Err(MigrationError::ToolFailed(format!(
                "liquibase update {}",
                describe_failure(&output)
            )));
        }

        tracing::info!(
            path = %database_path.display(),
            "liquibase update completed"
        );
        Ok(())
    }
}

/// JDBC connection string Liquibase expects for a SQLite file.
pub fn connection_url(database_path: &Path) -> String {
    format!("jdbc:sqlite:{}", database_path.display())
}

fn describe_failure(output: &ToolOutput) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let tail = match stderr.char_indices().nth_back(STDERR_TAIL_CHARS) {
        Some((index, _)) => &stderr[index..],
        None => stderr,
    };

    let status = match output.exit {
        ToolExit::Code(code) => format!("exited with code {code}"),
        ToolExit::Signaled => "was terminated by signal".to_string(),
    };

    if tail.is_empty() {
        status
    } else {
        format!("{status}: {tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_url_uses_jdbc_sqlite_scheme() {
        assert_eq!(
            connection_url(Path::new("/home/user/.echo/echo.db")),
            "jdbc:sqlite:/home/user/.echo/echo.db"
        );
    }

    #[test]
    fn update_command_passes_changelog_and_url() {
        let migrator = LiquibaseMigrator::new(
            "liquibase",
            "/opt/echo/changelog-master.xml",
            Duration::from_secs(10),
            Arc::new(TokioToolRunner),
        );

        let command = migrator.update_command(Path::new("/tmp/echo.db"));
        assert_eq!(command.program, PathBuf::from("liquibase"));
        assert_eq!(
            command.args,
            vec![
                "--changeLogFile=/opt/echo/changelog-master.xml",
                "--url=jdbc:sqlite:/tmp/echo.db",
                "update",
            ]
        );
    }
}
