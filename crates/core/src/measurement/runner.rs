//! Child-process invocation of the measurement tool.
//!
//! [`run_tool`] creates a fresh output folder, spawns the tool once for one
//! URL, captures stdout/stderr and enforces the configured wall-clock
//! timeout. Serialisation of invocations is the execution queue's job, not
//! the runner's.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::SecondsFormat;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;

use super::{ToolConfig, ITERATIONS};
use crate::types::Timestamp;

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output exceeding this limit is truncated.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long to wait for the output readers to drain after the child exits.
const READ_GRACE: Duration = Duration::from_secs(2);

/// A tool invocation that exited with status 0.
#[derive(Debug, Clone)]
pub struct ToolRun {
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
    /// Folder passed to the tool via `--outputFolder`.
    pub output_dir: PathBuf,
}

/// Errors that can occur while running the measurement tool.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("measurement tool could not be started ({program}): {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("measurement tool exited with {}", exit_label(.exit_code))]
    ExitFailure {
        exit_code: Option<i32>,
        stderr: String,
        elapsed_ms: u64,
    },

    #[error("measurement tool timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (killed by signal)".to_string(),
    }
}

/// Run the measurement tool for `url` and wait for it to finish or time out.
///
/// On success the tool's artifacts are left on disk for the result locator.
pub async fn run_tool(config: &ToolConfig, url: &str) -> Result<ToolRun, RunnerError> {
    let output_dir = config
        .results_root
        .join(invocation_dir_name(chrono::Utc::now()));
    tokio::fs::create_dir_all(&output_dir).await?;

    let cmd = build_command(config, &output_dir, url)?;

    tracing::info!(
        url,
        output_dir = %output_dir.display(),
        timeout_secs = config.timeout.as_secs(),
        "Running measurement tool",
    );

    let captured = run_with_timeout(cmd, config.timeout).await?;

    if captured.exit_code != Some(0) {
        return Err(RunnerError::ExitFailure {
            exit_code: captured.exit_code,
            stderr: captured.stderr,
            elapsed_ms: captured.elapsed_ms,
        });
    }

    Ok(ToolRun {
        stdout: captured.stdout,
        stderr: captured.stderr,
        elapsed_ms: captured.elapsed_ms,
        output_dir,
    })
}

/// Build the tool invocation:
/// `<command...> --config <config> --outputFolder <dir> <url> -n 1`.
pub fn build_command(
    config: &ToolConfig,
    output_dir: &Path,
    url: &str,
) -> Result<std::process::Command, RunnerError> {
    let (program, leading_args) = config
        .command
        .split_first()
        .ok_or_else(|| RunnerError::Spawn {
            program: String::new(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "measurement command is empty",
            ),
        })?;

    let mut cmd = std::process::Command::new(program);
    cmd.args(leading_args)
        .arg("--config")
        .arg(&config.config_path)
        .arg("--outputFolder")
        .arg(output_dir)
        .arg(url)
        .arg("-n")
        .arg(ITERATIONS.to_string());
    Ok(cmd)
}

/// Folder name for one invocation: the UTC timestamp with `:` and `.`
/// replaced so it is safe on every filesystem.
pub fn invocation_dir_name(now: Timestamp) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

struct Captured {
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
    elapsed_ms: u64,
}

/// Spawn `cmd`, capture its output streams and enforce `timeout`.
async fn run_with_timeout(
    mut cmd: std::process::Command,
    timeout: Duration,
) -> Result<Captured, RunnerError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Own process group, so a timeout takes down the whole tool tree.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let program = cmd.get_program().to_string_lossy().into_owned();
    let mut cmd = tokio::process::Command::from(cmd);
    cmd.kill_on_drop(true);
    let start = Instant::now();

    let mut child = cmd
        .spawn()
        .map_err(|source| RunnerError::Spawn { program, source })?;

    let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            Ok(Captured {
                stdout: collect(&mut stdout_task).await,
                stderr: collect(&mut stderr_task).await,
                exit_code: status.code(),
                elapsed_ms,
            })
        }
        Ok(Err(e)) => {
            stdout_task.abort();
            stderr_task.abort();
            Err(RunnerError::Io(e))
        }
        Err(_elapsed) => {
            kill_tree(&mut child).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            stdout_task.abort();
            let stderr = collect(&mut stderr_task).await;
            tracing::warn!(elapsed_ms, "Measurement tool killed after timeout");
            Err(RunnerError::Timeout { elapsed_ms, stderr })
        }
    }
}

async fn kill_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_process_group(pid);
    }
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "Child already gone when killing");
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // SAFETY: `kill` has no memory-safety preconditions. The negative pid
    // targets the process group created at spawn time.
    unsafe {
        libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

/// Wait briefly for a reader task and decode what it captured.
async fn collect(task: &mut JoinHandle<Vec<u8>>) -> String {
    match tokio::time::timeout(READ_GRACE, &mut *task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        _ => {
            task.abort();
            String::new()
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
