use async_trait::async_trait;
use indoc::indoc;
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::base::{Tool, ToolInvocation, ToolKind, ToolResult, ToolSchema};
use super::schema::{FieldSpec, FieldType, ParamSchema};
use crate::errors::{ToolError, ToolOutcome};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

// These have dedicated tools or would break the session
const DISALLOWED_COMMANDS: [&str; 5] = ["cat", "cd", "source", "rm", "kill"];

/// Runs a command with `bash -c` in the invocation directory
pub struct ShellTool {
    schema: ToolSchema,
}

impl ShellTool {
    pub fn new() -> Self {
        let schema = ParamSchema::new(vec![
            FieldSpec::new("command", FieldType::String)
                .required()
                .description("The bash command to run."),
            FieldSpec::new("timeout_secs", FieldType::Integer)
                .minimum(1.0)
                .description("Seconds to wait before the command is killed. Defaults to 120."),
        ]);
        Self {
            schema: ToolSchema::Structured(schema),
        }
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new()
    }
}

fn disallowed_command(command: &str) -> Option<&'static str> {
    let first = command.split_whitespace().next()?;
    DISALLOWED_COMMANDS.iter().copied().find(|c| *c == first)
}

fn check_command(invocation: &ToolInvocation) -> ToolOutcome<&str> {
    let command = invocation
        .str_param("command")
        .ok_or_else(|| ToolError::InvalidParameters("Missing 'command' parameter".into()))?;
    if let Some(disallowed) = disallowed_command(command) {
        return Err(ToolError::InvalidParameters(format!(
            "The command '{}' is not allowed",
            disallowed
        )));
    }
    if !invocation.cwd.is_dir() {
        return Err(ToolError::ExecutionError(format!(
            "The directory '{}' does not exist",
            invocation.cwd.display()
        )));
    }
    Ok(command)
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        indoc! {"
            Run a command in a bash shell from the working directory.
            stdout and stderr are returned together.
            Use read_file and write_file instead of cat and redirects for file access.
        "}
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Shell
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, invocation: ToolInvocation) -> ToolResult {
        let command = match check_command(&invocation) {
            Ok(command) => command,
            Err(e) => return e.into(),
        };

        let timeout_secs = invocation
            .u64_param("timeout_secs")
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        debug!(command = %command, cwd = %invocation.cwd.display(), "running shell command");
        let mut child = Command::new("bash");
        child
            .arg("-c")
            .arg(format!("{{ {}\n}} 2>&1", command))
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let timeout = Duration::from_secs(timeout_secs);
        let output = match tokio::time::timeout(timeout, child.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ToolError::ExecutionError(format!("Failed to run command: {}", e)).into()
            }
            Err(_) => {
                return ToolResult::error(format!(
                    "Command timed out after {} seconds",
                    timeout_secs
                ))
                .with_metadata("timed_out", json!(true));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let exit_code = output.status.code();

        if output.status.success() {
            ToolResult::success(stdout).with_metadata("exit_code", json!(exit_code))
        } else {
            let status = exit_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string());
            ToolResult::error(format!("Command failed with exit code {}", status))
                .with_output(stdout)
                .with_metadata("exit_code", json!(exit_code))
        }
    }
}
