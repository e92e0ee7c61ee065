//! Running the external migration tool: one blocking, timeout-bounded
//! invocation per call.

pub mod tokio_process;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{StoreError, StoreErrorKind};

pub use tokio_process::TokioToolRunner;

pub type ExecutionResult<T> = Result<T, StoreError>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Human-readable command line, used in log lines only.
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One run of the tool on behalf of a store operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolInvocation {
    /// Store operation the run belongs to; failures are attributed to it.
    pub operation: String,
    pub command: ToolCommand,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(operation: impl Into<String>, command: ToolCommand, timeout: Duration) -> Self {
        Self {
            operation: operation.into(),
            command,
            timeout,
        }
    }

    pub fn validate(&self) -> ExecutionResult<()> {
        if self.command.program.as_os_str().is_empty() {
            return Err(invalid_input(
                &self.operation,
                "command program path must not be empty",
            ));
        }

        if self
            .command
            .args
            .iter()
            .any(|arg| arg.is_empty() || arg.contains('\0'))
        {
            return Err(invalid_input(
                &self.operation,
                "command args must be non-empty and must not contain NUL bytes",
            ));
        }

        if self.timeout.is_zero() {
            return Err(invalid_input(
                &self.operation,
                "timeout must be greater than zero",
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ToolExit {
    Code(i32),
    /// Ended by a signal without an exit code.
    Signaled,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolOutput {
    pub exit: ToolExit,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn succeeded(&self) -> bool {
        self.exit == ToolExit::Code(0)
    }
}

/// Runs a tool to completion, blocking the caller. A run that outlives its
/// timeout is killed and reported as [`StoreErrorKind::Timeout`].
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> ExecutionResult<ToolOutput>;
}

/// Validates the invocation before handing it to `runner`.
pub fn run_validated(
    runner: &dyn ToolRunner,
    invocation: &ToolInvocation,
) -> ExecutionResult<ToolOutput> {
    invocation.validate()?;
    runner.run(invocation)
}

fn invalid_input(operation: &str, message: &str) -> StoreError {
    StoreError::new(StoreErrorKind::Validation, operation, message)
}
