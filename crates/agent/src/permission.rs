//! Permission gate for tools with side effects.

use async_trait::async_trait;

/// Tools that need approval before they run.
pub const GATED_TOOLS: [&str; 3] = ["run_command", "write_file", "edit_file"];

pub fn is_gated(tool: &str) -> bool {
    GATED_TOOLS.contains(&tool)
}

/// What the permission hook is asked to approve.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRequest {
    pub tool: String,
    /// The command line for `run_command`, the target path for file tools.
    pub description: String,
    pub input: serde_json::Value,
}

impl PermissionRequest {
    pub fn new(tool: &str, input: &serde_json::Value) -> Self {
        Self {
            tool: tool.to_string(),
            description: describe(tool, input),
            input: input.clone(),
        }
    }
}

/// Decides whether a gated tool call may run.
#[async_trait]
pub trait PermissionHook: Send + Sync {
    async fn check(&self, request: &PermissionRequest) -> bool;
}

#[async_trait]
impl<F> PermissionHook for F
where
    F: Fn(&PermissionRequest) -> bool + Send + Sync,
{
    async fn check(&self, request: &PermissionRequest) -> bool {
        self(request)
    }
}

fn describe(tool: &str, input: &serde_json::Value) -> String {
    let key = if tool == "run_command" { "command" } else { "path" };
    match input[key].as_str() {
        Some(value) => value.to_string(),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_side_effect_tools_are_gated() {
        assert!(is_gated("run_command"));
        assert!(is_gated("write_file"));
        assert!(is_gated("edit_file"));
        assert!(!is_gated("read_file"));
        assert!(!is_gated("list_files"));
        assert!(!is_gated("task_create"));
    }

    #[test]
    fn descriptions() {
        let req = PermissionRequest::new("run_command", &json!({"command": "cargo test"}));
        assert_eq!(req.description, "cargo test");

        let req = PermissionRequest::new("write_file", &json!({"path": "src/main.rs", "content": "x"}));
        assert_eq!(req.description, "src/main.rs");

        let req = PermissionRequest::new("edit_file", &json!({}));
        assert_eq!(req.description, "{}");
    }

    #[tokio::test]
    async fn closures_are_hooks() {
        let deny_rm = |req: &PermissionRequest| !req.description.starts_with("rm ");
        let hook: &dyn PermissionHook = &deny_rm;
        assert!(!hook.check(&PermissionRequest::new("run_command", &json!({"command": "rm -rf x"}))).await);
        assert!(hook.check(&PermissionRequest::new("run_command", &json!({"command": "ls"}))).await);
    }
}
