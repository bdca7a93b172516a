//! Task tools — the only way tasks are created or changed.
//!
//! All three share one [`TaskStore`] handle with whoever displays the list.

use async_trait::async_trait;
use tandem_core::error::ToolError;
use tandem_core::host::Host;
use tandem_core::task::{Task, TaskPatch, TaskStatus, TaskStore};
use tandem_core::tool::Tool;

use crate::required_str;

fn render(task: &Task) -> String {
    let status = match task.status {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Completed => "completed",
    };
    format!("#{} [{status}] {}", task.id, task.subject)
}

pub struct TaskCreateTool {
    store: TaskStore,
}

impl TaskCreateTool {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TaskCreateTool {
    fn name(&self) -> &str {
        "task_create"
    }

    fn description(&self) -> &str {
        "Add a task to the task list. Use it to plan multi-step work."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "subject": { "type": "string", "description": "Short title of the task" },
                "description": { "type": "string", "description": "Optional details" }
            },
            "required": ["subject"]
        })
    }

    async fn execute(&self, input: serde_json::Value, _host: &dyn Host) -> Result<String, ToolError> {
        let subject = required_str(&input, "subject")?;
        let description = input["description"].as_str().unwrap_or_default();
        let task = self.store.create(subject, description);
        Ok(format!("Created task {}", render(&task)))
    }
}

pub struct TaskUpdateTool {
    store: TaskStore,
}

impl TaskUpdateTool {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TaskUpdateTool {
    fn name(&self) -> &str {
        "task_update"
    }

    fn description(&self) -> &str {
        "Update a task's status, subject or description. Mark tasks in_progress when starting and completed when done."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Task id" },
                "status": {
                    "type": "string",
                    "enum": ["pending", "in_progress", "completed"]
                },
                "subject": { "type": "string" },
                "description": { "type": "string" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, input: serde_json::Value, _host: &dyn Host) -> Result<String, ToolError> {
        // Models send numeric ids as often as string ones.
        let id = match &input["id"] {
            serde_json::Value::Number(n) => n.to_string(),
            _ => required_str(&input, "id")?.to_string(),
        };
        let status = input["status"]
            .as_str()
            .map(str::parse::<TaskStatus>)
            .transpose()
            .map_err(ToolError::InvalidArguments)?;

        let patch = TaskPatch {
            subject: input["subject"].as_str().map(String::from),
            status,
            description: input["description"].as_str().map(String::from),
        };

        let task = self.store.update(&id, patch).ok_or_else(|| ToolError::ExecutionFailed {
            tool_name: "task_update".into(),
            reason: format!("no task with id '{id}'"),
        })?;
        Ok(format!("Updated task {}", render(&task)))
    }
}

pub struct TaskListTool {
    store: TaskStore,
}

impl TaskListTool {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TaskListTool {
    fn name(&self) -> &str {
        "task_list"
    }

    fn description(&self) -> &str {
        "Show every task with its id and status."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: serde_json::Value, _host: &dyn Host) -> Result<String, ToolError> {
        let tasks = self.store.list();
        if tasks.is_empty() {
            return Ok("No tasks.".into());
        }
        Ok(tasks.iter().map(render).collect::<Vec<_>>().join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::host::NullHost;

    #[tokio::test]
    async fn create_update_list() {
        let store = TaskStore::new();
        let create = TaskCreateTool::new(store.clone());
        let update = TaskUpdateTool::new(store.clone());
        let list = TaskListTool::new(store.clone());

        assert_eq!(
            list.execute(serde_json::json!({}), &NullHost).await.unwrap(),
            "No tasks."
        );

        let out = create
            .execute(serde_json::json!({"subject": "Write parser"}), &NullHost)
            .await
            .unwrap();
        assert_eq!(out, "Created task #1 [pending] Write parser");

        let out = update
            .execute(serde_json::json!({"id": 1, "status": "in_progress"}), &NullHost)
            .await
            .unwrap();
        assert_eq!(out, "Updated task #1 [in_progress] Write parser");

        create
            .execute(serde_json::json!({"subject": "Test it", "description": "all cases"}), &NullHost)
            .await
            .unwrap();
        let out = list.execute(serde_json::json!({}), &NullHost).await.unwrap();
        assert_eq!(out, "#1 [in_progress] Write parser\n#2 [pending] Test it");
        assert_eq!(store.get("2").unwrap().description, "all cases");
    }

    #[tokio::test]
    async fn update_rejects_bad_status_and_unknown_id() {
        let store = TaskStore::new();
        store.create("x", "");
        let update = TaskUpdateTool::new(store);

        let err = update
            .execute(serde_json::json!({"id": "1", "status": "done"}), &NullHost)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = update
            .execute(serde_json::json!({"id": "9"}), &NullHost)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no task with id '9'"));
    }
}
