use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::error::{StoreError, StoreErrorKind};
use crate::execution::{ExecutionResult, ToolExit, ToolInvocation, ToolOutput, ToolRunner};

const KILL_GRACE: Duration = Duration::from_secs(1);
const OUTPUT_DRAIN: Duration = Duration::from_millis(250);

/// Drives each run on a scoped thread with its own current-thread runtime,
/// so it can be called from plain code and from inside a tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioToolRunner;

impl ToolRunner for TokioToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> ExecutionResult<ToolOutput> {
        std::thread::scope(|scope| {
            let runner = scope.spawn(|| {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|error| {
                        process_failure(
                            &invocation.operation,
                            format!("failed to start process runtime: {error}"),
                        )
                    })?;
                runtime.block_on(run_tool(invocation))
            });

            runner.join().unwrap_or_else(|_| {
                Err(process_failure(
                    &invocation.operation,
                    "process runner thread panicked".to_string(),
                ))
            })
        })
    }
}

async fn run_tool(invocation: &ToolInvocation) -> ExecutionResult<ToolOutput> {
    let mut command = Command::new(&invocation.command.program);
    command
        .args(&invocation.command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a timeout also reaches the tool's children
    // (the Liquibase launcher script forks the JVM).
    #[cfg(unix)]
    command.process_group(0);

    let started = Instant::now();
    let mut child = command.spawn().map_err(|error| {
        process_failure(
            &invocation.operation,
            format!(
                "failed to spawn '{}': {error}",
                invocation.command.program.display()
            ),
        )
    })?;

    tracing::debug!(
        operation = %invocation.operation,
        command = %invocation.command.display(),
        pid = ?child.id(),
        "spawned migration tool"
    );

    let stdout_reader = tokio::spawn(read_all(child.stdout.take()));
    let stderr_reader = tokio::spawn(read_all(child.stderr.take()));

    let status = match tokio::time::timeout(invocation.timeout, child.wait()).await {
        Ok(result) => result.map_err(|error| {
            process_failure(
                &invocation.operation,
                format!("failed to wait for process: {error}"),
            )
        })?,
        Err(_) => {
            kill_tree(&mut child);
            let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
            stdout_reader.abort();
            stderr_reader.abort();
            return Err(StoreError::new(
                StoreErrorKind::Timeout,
                invocation.operation.as_str(),
                format!(
                    "'{}' timed out after {}ms",
                    invocation.command.program.display(),
                    invocation.timeout.as_millis()
                ),
            ));
        }
    };

    // Descendants may hold the pipes open after the tool itself exits.
    let stdout = tokio::time::timeout(OUTPUT_DRAIN, stdout_reader)
        .await
        .ok()
        .and_then(Result::ok)
        .unwrap_or_default();
    let stderr = tokio::time::timeout(OUTPUT_DRAIN, stderr_reader)
        .await
        .ok()
        .and_then(Result::ok)
        .unwrap_or_default();

    let exit = match status.code() {
        Some(code) => ToolExit::Code(code),
        None => ToolExit::Signaled,
    };

    Ok(ToolOutput {
        exit,
        stdout,
        stderr,
        elapsed: started.elapsed(),
    })
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(mut reader) = reader {
        let _ = reader.read_to_end(&mut buffer).await;
    }
    buffer
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        let pgid = -(pid as libc::pid_t);
        let result = unsafe { libc::kill(pgid, libc::SIGKILL) };
        if result == 0 {
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.start_kill();
}

fn process_failure(operation: &str, message: String) -> StoreError {
    StoreError::new(StoreErrorKind::ProcessFailure, operation, message)
}
