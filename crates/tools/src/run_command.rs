//! Run command tool — execute a shell command through the host.

use async_trait::async_trait;
use tandem_core::error::ToolError;
use tandem_core::host::{CommandOutput, Host};
use tandem_core::tool::Tool;

use crate::{host_failure, required_str};

pub const NAME: &str = "run_command";

/// Executes a command with `sh -c` (or `cmd /C`) in the host's working
/// directory. A non-zero exit status is reported, not treated as an error.
pub struct RunCommandTool;

/// Render stdout, stderr and a non-zero exit code as one block of text.
pub fn format_output(output: &CommandOutput) -> String {
    let mut text = output.stdout.trim_end().to_string();
    let stderr = output.stderr.trim_end();
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("[stderr]: ");
        text.push_str(stderr);
    }
    if output.exit_code != 0 {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&format!("[exit code: {}]", output.exit_code));
    }
    if text.is_empty() {
        text.push_str("(no output)");
    }
    text
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Execute a shell command in the working directory and return stdout/stderr. \
         Use this for running programs, builds, tests, git operations, etc."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: serde_json::Value, host: &dyn Host) -> Result<String, ToolError> {
        let command = required_str(&input, "command")?;
        let output = host
            .exec(command, None)
            .await
            .map_err(|e| host_failure(NAME, e))?;
        Ok(format_output(&output))
    }
}
