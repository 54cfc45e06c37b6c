//! Shared process launch/capture plumbing for command handlers.

use std::process::Stdio;
use std::time::Instant;

use chrono::Utc;
use tokio::process::Command as ProcessCommand;
use tracing::warn;

use super::command::{Command, CommandResult};

/// Apply `working_dir` and `env` from the command.
///
/// A non-empty `env` map fully replaces the inherited environment.
pub(super) fn apply_context(cmd: &mut ProcessCommand, command: &Command) {
    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }
    if !command.env.is_empty() {
        cmd.env_clear();
        cmd.envs(&command.env);
    }
}

/// Spawn the prepared process, enforce the command's timeout, and capture
/// stdout/stderr into a [`CommandResult`].
pub(super) async fn run(mut cmd: ProcessCommand, command: &Command) -> CommandResult {
    let started_at = Utc::now().timestamp_millis();
    let start = Instant::now();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Ensures the child is reaped if the wait future is dropped on timeout.
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return finish(
                command,
                started_at,
                start,
                -1,
                String::new(),
                String::new(),
                Some(format!("failed to launch: {e}")),
            )
        }
    };

    let wait = child.wait_with_output();
    let waited = match command.timeout() {
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(result) => result,
            Err(_) => {
                warn!(id = %command.id, timeout_ms = limit.as_millis() as u64, "command timed out");
                return finish(
                    command,
                    started_at,
                    start,
                    -1,
                    String::new(),
                    String::new(),
                    Some(format!("command timed out after {}ms", limit.as_millis())),
                );
            }
        },
        None => wait.await,
    };

    match waited {
        Ok(output) => {
            let exit_code = output.status.code().unwrap_or(-1);
            finish(
                command,
                started_at,
                start,
                exit_code,
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
                None,
            )
        }
        Err(e) => finish(
            command,
            started_at,
            start,
            -1,
            String::new(),
            String::new(),
            Some(format!("wait failed: {e}")),
        ),
    }
}

fn finish(
    command: &Command,
    started_at: i64,
    start: Instant,
    exit_code: i32,
    stdout: String,
    stderr: String,
    error: Option<String>,
) -> CommandResult {
    CommandResult {
        id: command.id.clone(),
        command: command.command.clone(),
        success: exit_code == 0 && error.is_none(),
        exit_code,
        stdout,
        stderr,
        error,
        started_at,
        completed_at: Utc::now().timestamp_millis(),
        duration_ms: start.elapsed().as_millis() as u64,
    }
}
