//! Edit file tool — exact string replacement.

use async_trait::async_trait;
use tandem_core::error::ToolError;
use tandem_core::host::Host;
use tandem_core::tool::Tool;

use crate::{host_failure, required_str};

pub const NAME: &str = "edit_file";

/// Replaces `old_string` with `new_string`. Without `replace_all` the match
/// must be unique.
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Replace an exact string in a file. old_string must match exactly once unless replace_all is true; \
         include surrounding lines to make it unique."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file to edit"
                },
                "old_string": {
                    "type": "string",
                    "description": "The exact text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence (default false)"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, input: serde_json::Value, host: &dyn Host) -> Result<String, ToolError> {
        let path = required_str(&input, "path")?;
        let old = required_str(&input, "old_string")?;
        let new = required_str(&input, "new_string")?;
        let replace_all = input["replace_all"].as_bool().unwrap_or(false);

        if old.is_empty() {
            return Err(ToolError::InvalidArguments("'old_string' must not be empty".into()));
        }
        if old == new {
            return Err(ToolError::InvalidArguments(
                "'old_string' and 'new_string' are identical".into(),
            ));
        }

        let content = host
            .read_file(path)
            .await
            .map_err(|e| host_failure(NAME, e))?;

        let count = content.matches(old).count();
        let updated = match count {
            0 => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: NAME.into(),
                    reason: format!("old_string not found in {path}"),
                });
            }
            1 => content.replacen(old, new, 1),
            _ if replace_all => content.replace(old, new),
            n => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: NAME.into(),
                    reason: format!(
                        "old_string appears {n} times in {path}; add surrounding context or set replace_all"
                    ),
                });
            }
        };

        host.write_file(path, &updated)
            .await
            .map_err(|e| host_failure(NAME, e))?;

        Ok(match count {
            1 => format!("Edited {path}"),
            n => format!("Edited {path} ({n} replacements)"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalHost;

    async fn edit(dir: &tempfile::TempDir, input: serde_json::Value) -> Result<String, ToolError> {
        EditFileTool
            .execute(input, &LocalHost::with_cwd(dir.path()))
            .await
    }

    #[tokio::test]
    async fn unique_replacement() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {\n    old();\n}\n").unwrap();

        let out = edit(
            &dir,
            serde_json::json!({"path": "a.rs", "old_string": "old()", "new_string": "new()"}),
        )
        .await
        .unwrap();
        assert_eq!(out, "Edited a.rs");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.rs")).unwrap(),
            "fn main() {\n    new();\n}\n"
        );
    }

    #[tokio::test]
    async fn ambiguous_without_replace_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x x x").unwrap();

        let err = edit(
            &dir,
            serde_json::json!({"path": "a.txt", "old_string": "x", "new_string": "y"}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("appears 3 times"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "x x x");
    }

    #[tokio::test]
    async fn replace_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x x x").unwrap();

        let out = edit(
            &dir,
            serde_json::json!({"path": "a.txt", "old_string": "x", "new_string": "y", "replace_all": true}),
        )
        .await
        .unwrap();
        assert_eq!(out, "Edited a.txt (3 replacements)");
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "y y y");
    }

    #[tokio::test]
    async fn missing_old_string() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "abc").unwrap();

        let err = edit(
            &dir,
            serde_json::json!({"path": "a.txt", "old_string": "zzz", "new_string": "y"}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
