//! Process-backed transform execution.
//!
//! # Design
//!
//! - The executor is a trait so dispatch can be exercised against stubs.
//! - Both pipes are drained concurrently with the wait so a chatty transformer cannot
//!   block on a full pipe.
//! - One deadline bounds both the wait and the pipe drain. A child still running at the
//!   deadline is killed and reported as [`ExecError::TimedOut`]; pipes still held open
//!   past it (by a detached grandchild) are abandoned and their output discarded.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tengine_core::{CommandTemplate, TransformOptions};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant as Deadline;
use tracing::{debug, warn};

use crate::error::{ExecError, ExecResult};
use crate::template::{RenderContext, render_args};

/// Upper bound on captured stdout/stderr per stream.
const MAX_CAPTURE_BYTES: usize = 64 * 1024;

/// Everything needed to run one step.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Transformer name, for diagnostics.
    pub transformer: String,
    /// Process template.
    pub command: CommandTemplate,
    /// Step input path.
    pub source_path: PathBuf,
    /// Step output path.
    pub target_path: PathBuf,
    /// Step input mimetype.
    pub source_media_type: String,
    /// Step output mimetype.
    pub target_media_type: String,
    /// Options forwarded to the step.
    pub options: TransformOptions,
    /// Wall-clock limit for the process.
    pub timeout: Duration,
}

/// Captured result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    /// Process exit code (always 0 for a returned output).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Time from spawn to exit.
    pub elapsed: Duration,
}

/// Runs one transform step.
#[async_trait]
pub trait TransformExecutor: Send + Sync {
    /// Execute the step. Success means exit code 0 and an existing target file.
    async fn execute(&self, invocation: Invocation) -> ExecResult<ExecutionOutput>;
}

/// Executor spawning transformers through `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Construct the executor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransformExecutor for ProcessExecutor {
    async fn execute(&self, invocation: Invocation) -> ExecResult<ExecutionOutput> {
        let args = render_args(
            &invocation.command,
            &RenderContext {
                source: &invocation.source_path,
                target: &invocation.target_path,
                source_media_type: &invocation.source_media_type,
                target_media_type: &invocation.target_media_type,
                options: &invocation.options,
            },
        );
        debug!(
            transformer = %invocation.transformer,
            program = %invocation.command.program,
            ?args,
            "spawning transformer"
        );

        let started = Instant::now();
        let deadline = Deadline::now() + invocation.timeout;
        let mut child = Command::new(&invocation.command.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                transformer: invocation.transformer.clone(),
                program: invocation.command.program.clone(),
                source,
            })?;

        let stdout_task = tokio::spawn(drain(child.stdout.take()));
        let stderr_task = tokio::spawn(drain(child.stderr.take()));

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                stdout_task.abort();
                stderr_task.abort();
                return Err(ExecError::Wait {
                    transformer: invocation.transformer,
                    source,
                });
            }
            Err(_) => {
                if let Err(err) = child.kill().await {
                    warn!(
                        transformer = %invocation.transformer,
                        error = %err,
                        "failed to kill timed out transformer"
                    );
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(ExecError::TimedOut {
                    transformer: invocation.transformer,
                    timeout_ms: u64::try_from(invocation.timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };
        let elapsed = started.elapsed();
        let (stdout, stderr) = tokio::join!(
            collect(stdout_task, deadline, &invocation.transformer, "stdout"),
            collect(stderr_task, deadline, &invocation.transformer, "stderr"),
        );

        interpret(invocation, status, stdout, stderr, elapsed).await
    }
}

async fn interpret(
    invocation: Invocation,
    status: ExitStatus,
    stdout: String,
    stderr: String,
    elapsed: Duration,
) -> ExecResult<ExecutionOutput> {
    match status.code() {
        Some(0) => {
            let produced = tokio::fs::try_exists(&invocation.target_path)
                .await
                .unwrap_or(false);
            if !produced {
                return Err(ExecError::MissingTarget {
                    transformer: invocation.transformer,
                    path: invocation.target_path,
                });
            }
            debug!(
                transformer = %invocation.transformer,
                elapsed_ms = elapsed.as_millis(),
                "transformer finished"
            );
            Ok(ExecutionOutput {
                exit_code: 0,
                stdout,
                stderr,
                elapsed,
            })
        }
        Some(exit_code) => Err(ExecError::NonZeroExit {
            transformer: invocation.transformer,
            exit_code,
            stderr,
        }),
        None => Err(ExecError::Terminated {
            transformer: invocation.transformer,
            stderr,
        }),
    }
}

async fn drain<R>(pipe: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Vec::new();
    };
    let mut captured = Vec::new();
    let mut chunk = [0_u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => {
                let room = MAX_CAPTURE_BYTES.saturating_sub(captured.len());
                captured.extend_from_slice(&chunk[..read.min(room)]);
            }
        }
    }
    captured
}

async fn collect(
    mut task: JoinHandle<Vec<u8>>,
    deadline: Deadline,
    transformer: &str,
    stream: &'static str,
) -> String {
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(joined) => String::from_utf8_lossy(&joined.unwrap_or_default())
            .trim_end()
            .to_owned(),
        Err(_) => {
            task.abort();
            warn!(
                transformer,
                stream,
                "transformer output still open at the time limit; discarding it"
            );
            String::new()
        }
    }
}
