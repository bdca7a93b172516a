//! Write file tool — create or overwrite a file.

use async_trait::async_trait;
use tandem_core::error::ToolError;
use tandem_core::host::Host;
use tandem_core::tool::Tool;

use crate::{host_failure, required_str};

pub const NAME: &str = "write_file";

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file (and parent directories) if it doesn't exist, overwrites if it does."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: serde_json::Value, host: &dyn Host) -> Result<String, ToolError> {
        let path = required_str(&input, "path")?;
        let content = required_str(&input, "content")?;

        host.write_file(path, content)
            .await
            .map_err(|e| host_failure(NAME, e))?;

        Ok(format!("Wrote {} bytes to {path}", content.len()))
    }
}
