//! Read file tool — numbered lines with an optional window.

use async_trait::async_trait;
use tandem_core::error::ToolError;
use tandem_core::host::Host;
use tandem_core::tool::Tool;

use crate::{host_failure, optional_u64, required_str};

pub const NAME: &str = "read_file";

const DEFAULT_LIMIT: usize = 2000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read a text file. Returns numbered lines. Use offset and limit to page through large files."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "1-based line to start from (default 1)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (default 2000)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value, host: &dyn Host) -> Result<String, ToolError> {
        let path = required_str(&input, "path")?;
        let offset = optional_u64(&input, "offset")?.unwrap_or(1).max(1) as usize;
        let limit = optional_u64(&input, "limit")?
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_LIMIT);

        let content = host
            .read_file(path)
            .await
            .map_err(|e| host_failure(NAME, e))?;

        if content.is_empty() {
            return Ok("(empty file)".into());
        }

        let total = content.lines().count();
        if offset > total {
            return Err(ToolError::InvalidArguments(format!(
                "offset {offset} is past the end of {path} ({total} lines)"
            )));
        }

        let mut out: Vec<String> = content
            .lines()
            .enumerate()
            .skip(offset - 1)
            .take(limit)
            .map(|(i, line)| format!("{:>6}\t{line}", i + 1))
            .collect();

        let last = offset - 1 + out.len();
        if last < total {
            out.push(format!("... ({} more lines)", total - last));
        }
        Ok(out.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalHost;

    #[test]
    fn tool_definition() {
        let schema = ReadFileTool.input_schema();
        assert_eq!(ReadFileTool.name(), "read_file");
        assert_eq!(schema["required"], serde_json::json!(["path"]));
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.txt"), "Hello, world!\nsecond\n").unwrap();
        let host = LocalHost::with_cwd(dir.path());

        let output = ReadFileTool
            .execute(serde_json::json!({"path": "test.txt"}), &host)
            .await
            .unwrap();
        assert_eq!(output, "     1\tHello, world!\n     2\tsecond");
    }

    #[tokio::test]
    async fn offset_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (1..=10).map(|i| format!("line {i}\n")).collect();
        std::fs::write(dir.path().join("ten.txt"), body).unwrap();
        let host = LocalHost::with_cwd(dir.path());

        let output = ReadFileTool
            .execute(
                serde_json::json!({"path": "ten.txt", "offset": 4, "limit": 2}),
                &host,
            )
            .await
            .unwrap();
        assert_eq!(output, "     4\tline 4\n     5\tline 5\n... (5 more lines)");
    }

    #[tokio::test]
    async fn offset_past_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.txt"), "only\n").unwrap();
        let host = LocalHost::with_cwd(dir.path());

        let err = ReadFileTool
            .execute(serde_json::json!({"path": "one.txt", "offset": 3}), &host)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReadFileTool
            .execute(
                serde_json::json!({"path": "missing.txt"}),
                &LocalHost::with_cwd(dir.path()),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }
}
