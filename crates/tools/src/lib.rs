//! Built-in tool implementations for tandem.
//!
//! Tools give the agent the ability to act on the machine it runs on:
//! run shell commands, read, write and edit files, find files, and keep a
//! task list. Every executor goes through the [`Host`] it is handed, and
//! [`LocalHost`] is the implementation for the local machine.

pub mod edit_file;
pub mod host;
pub mod list_files;
pub mod read_file;
pub mod run_command;
pub mod tasks;
pub mod write_file;

use std::sync::Arc;
use tandem_core::error::{HostError, ToolError};
use tandem_core::task::TaskStore;
use tandem_core::tool::ToolRegistry;

pub use host::LocalHost;

/// Create a registry with every built-in tool, sharing `store` with the
/// task tools.
pub fn default_registry(store: TaskStore) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(run_command::RunCommandTool));
    registry.register(Arc::new(read_file::ReadFileTool));
    registry.register(Arc::new(write_file::WriteFileTool));
    registry.register(Arc::new(edit_file::EditFileTool));
    registry.register(Arc::new(list_files::ListFilesTool));
    registry.register(Arc::new(tasks::TaskCreateTool::new(store.clone())));
    registry.register(Arc::new(tasks::TaskUpdateTool::new(store.clone())));
    registry.register(Arc::new(tasks::TaskListTool::new(store)));
    registry
}

pub(crate) fn required_str<'a>(input: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    input[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

pub(crate) fn optional_u64(input: &serde_json::Value, key: &str) -> Result<Option<u64>, ToolError> {
    match &input[key] {
        serde_json::Value::Null => Ok(None),
        value => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' must be a non-negative integer"))),
    }
}

pub(crate) fn host_failure(tool_name: &str, err: HostError) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_all_tools() {
        let registry = default_registry(TaskStore::new());
        assert_eq!(
            registry.names(),
            vec![
                "edit_file",
                "list_files",
                "read_file",
                "run_command",
                "task_create",
                "task_list",
                "task_update",
                "write_file",
            ]
        );
        for def in registry.definitions() {
            assert_eq!(def.input_schema["type"], "object", "{}", def.name);
        }
    }

    #[tokio::test]
    async fn registry_dispatch_through_local_host() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "remember").unwrap();
        let host = LocalHost::with_cwd(dir.path());
        let registry = default_registry(TaskStore::new());

        let out = registry
            .execute("read_file", serde_json::json!({"path": "notes.txt"}), &host)
            .await
            .unwrap();
        assert!(out.ends_with("remember"));
    }

    #[test]
    fn optional_integer_arguments() {
        let input = serde_json::json!({"limit": 5, "offset": "x"});
        assert_eq!(optional_u64(&input, "limit").unwrap(), Some(5));
        assert_eq!(optional_u64(&input, "missing").unwrap(), None);
        assert!(optional_u64(&input, "offset").is_err());
    }
}
