//! Script command handler.
//!
//! Runs mailbox commands of `type: script`. The script must be a bundled,
//! relative artifact: absolute paths and `..` traversal are rejected
//! before any interpreter is invoked.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command as ProcessCommand;
use tracing::debug;

use super::command::{Command, CommandResult, CommandType};
use super::process;
use super::CommandHandler;

/// Executes bundled scripts through an interpreter chosen by extension.
pub struct ScriptHandler;

/// Interpreter for a script path: `.py → python`, `.js → node`,
/// `.rb → ruby`, anything else runs under `sh`.
fn interpreter_for(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("py") => "python",
        Some("js") => "node",
        Some("rb") => "ruby",
        _ => "sh",
    }
}

#[async_trait]
impl CommandHandler for ScriptHandler {
    fn name(&self) -> &'static str {
        "script"
    }

    fn can_handle(&self, command: &Command) -> bool {
        command.command_type == CommandType::Script
    }

    async fn execute(&self, command: &Command) -> CommandResult {
        let path = command.command.trim();
        if path.is_empty() {
            return CommandResult::rejected(command, "empty script path");
        }
        if path.contains("..") {
            return CommandResult::rejected(
                command,
                format!("path traversal rejected: {path}"),
            );
        }
        if Path::new(path).is_absolute() {
            return CommandResult::rejected(
                command,
                format!("absolute script path rejected: {path}"),
            );
        }

        let interpreter = interpreter_for(path);
        let mut cmd = ProcessCommand::new(interpreter);
        cmd.arg(path).args(&command.args);
        process::apply_context(&mut cmd, command);

        debug!(id = %command.id, script = %path, interpreter, "executing script");
        process::run(cmd, command).await
    }
}
