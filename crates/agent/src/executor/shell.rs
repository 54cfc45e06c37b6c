//! Shell command handler.
//!
//! Runs mailbox commands of `type: shell`. A command with `args` is
//! executed directly (exec-style, no shell involved); a command without
//! `args` is run as a shell line via `sh -c`. Operators should keep the
//! dual interpretation in mind when quoting.

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command as ProcessCommand;
use tracing::debug;

use super::command::{Command, CommandResult, CommandType};
use super::process;
use super::CommandHandler;

/// Executes shell commands after screening them against a curated set of
/// dangerous patterns. Screening is fail-closed: a match produces a
/// rejection result and no process is ever started.
pub struct ShellHandler {
    patterns: Vec<(Regex, &'static str)>,
}

impl ShellHandler {
    pub fn new() -> Self {
        let patterns = vec![
            (
                // `rm -rf` at the start of the line or after a separator.
                Regex::new(r"(?:^|[;&|`])\s*rm\s+-rf").expect("valid pattern"),
                "destructive removal (rm -rf)",
            ),
            (
                Regex::new(r"(?i)format\s+c:").expect("valid pattern"),
                "disk format (format c:)",
            ),
            (
                Regex::new(r"\$\(").expect("valid pattern"),
                "command substitution ($(...))",
            ),
        ];
        Self { patterns }
    }

    /// Description of the first dangerous pattern the line matches.
    fn dangerous(&self, line: &str) -> Option<&'static str> {
        self.patterns
            .iter()
            .find(|(pattern, _)| pattern.is_match(line))
            .map(|(_, description)| *description)
    }
}

impl Default for ShellHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandHandler for ShellHandler {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn can_handle(&self, command: &Command) -> bool {
        command.command_type == CommandType::Shell
    }

    async fn execute(&self, command: &Command) -> CommandResult {
        if command.command.trim().is_empty() {
            return CommandResult::rejected(command, "empty command");
        }
        if let Some(pattern) = self.dangerous(&command.command) {
            return CommandResult::rejected(
                command,
                format!("dangerous pattern rejected: {pattern}"),
            );
        }

        let mut cmd = if command.args.is_empty() {
            let mut cmd = ProcessCommand::new("sh");
            cmd.arg("-c").arg(&command.command);
            cmd
        } else {
            let mut cmd = ProcessCommand::new(&command.command);
            cmd.args(&command.args);
            cmd
        };
        process::apply_context(&mut cmd, command);

        debug!(id = %command.id, command = %command.command, "executing shell command");
        process::run(cmd, command).await
    }
}
