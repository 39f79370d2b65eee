//! Shell skill - execute a command with a bounded duration

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::skills::{Skill, SkillError};

/// Default command timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Execute a shell command
pub struct ShellCommandSkill;

#[async_trait]
impl Skill for ShellCommandSkill {
    fn name(&self) -> &'static str {
        "shell_command"
    }

    fn description(&self) -> &'static str {
        "Executes a shell command. DANGEROUS."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command to execute in the shell"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Maximum run time in seconds"
                }
            },
            "required": ["command"]
        })
    }

    fn permissions(&self) -> &'static [&'static str] {
        &["shell_exec"]
    }

    async fn execute(&self, input: Value) -> Result<Value, SkillError> {
        let command = input["command"]
            .as_str()
            .ok_or_else(|| SkillError::InvalidInput("command must be a string".to_string()))?;
        let cwd = input["cwd"].as_str().unwrap_or(".");
        let timeout_secs = input["timeout_seconds"].as_u64().unwrap_or(DEFAULT_TIMEOUT_SECS);

        debug!(%command, %cwd, timeout_secs, "ShellCommandSkill::execute: called");

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(Duration::from_secs(timeout_secs), async {
            child.wait_with_output().await
        })
        .await
        {
            Ok(output) => output?,
            Err(_) => {
                debug!(%command, "ShellCommandSkill::execute: command timed out");
                return Ok(serde_json::json!({
                    "stdout": "",
                    "stderr": "",
                    "exit_code": -1,
                    "error": "Command timed out"
                }));
            }
        };

        Ok(serde_json::json!({
            "stdout": String::from_utf8_lossy(&output.stdout).trim().to_string(),
            "stderr": String::from_utf8_lossy(&output.stderr).trim().to_string(),
            "exit_code": output.status.code().unwrap_or(-1),
            "error": ""
        }))
    }
}
