//! List files tool — glob matching relative to the working directory.

use async_trait::async_trait;
use tandem_core::error::ToolError;
use tandem_core::host::Host;
use tandem_core::tool::Tool;

use crate::{host_failure, required_str};

pub const NAME: &str = "list_files";

const MAX_RESULTS: usize = 500;

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "List files matching a glob pattern (e.g. \"*\", \"src/**/*.rs\"), relative to the working directory."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: serde_json::Value, host: &dyn Host) -> Result<String, ToolError> {
        let pattern = required_str(&input, "pattern")?;
        let matches = host
            .glob(pattern)
            .await
            .map_err(|e| host_failure(NAME, e))?;

        if matches.is_empty() {
            return Ok(format!("No files match '{pattern}'"));
        }

        let mut out = matches
            .iter()
            .take(MAX_RESULTS)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        if matches.len() > MAX_RESULTS {
            out.push_str(&format!("\n... and {} more", matches.len() - MAX_RESULTS));
        }
        Ok(out)
    }
}
