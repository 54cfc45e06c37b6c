//! Command and result wire types.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Kind of remote command, used for handler dispatch and result subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Shell,
    Script,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Script => "script",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote command received from the agent's mailbox.
///
/// `id` is supplied by the sender and echoed verbatim in the result so the
/// sender can correlate. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,

    #[serde(rename = "type")]
    pub command_type: CommandType,

    /// Shell line or script path, depending on `type`.
    pub command: String,

    /// With args the command is executed directly (exec-style); without
    /// args a shell command is run as a `sh -c` line.
    #[serde(default)]
    pub args: Vec<String>,

    /// When non-empty, fully replaces the inherited environment — values
    /// are not merged with the agent's own.
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Command {
    /// Execution deadline, if one was requested.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Outcome of one command, published exactly once (best-effort) on
/// `P.A.exec.{type}.{id}.result`.
///
/// `exit_code` is `-1` whenever the process could not be launched, was
/// killed on timeout, or the command was rejected before launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: String,
    pub command: String,
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// UTC epoch milliseconds.
    pub started_at: i64,
    /// UTC epoch milliseconds.
    pub completed_at: i64,
    /// Measured with monotonic time.
    pub duration_ms: u64,
}

impl CommandResult {
    /// Result for a command rejected before any process was started.
    pub fn rejected(command: &Command, error: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: command.id.clone(),
            command: command.command.clone(),
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error.into()),
            started_at: now,
            completed_at: now,
            duration_ms: 0,
        }
    }
}
