//! Task list shared between the task tools and whoever displays it.
//!
//! Tasks are created and mutated only by the dedicated tools. Observers
//! detect changes by comparing [`TaskStore::revision`].

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub subject: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub description: String,
}

/// Partial update applied by `task_update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default)]
struct TaskState {
    tasks: Vec<Task>,
    next_id: u64,
    revision: u64,
}

/// Cloneable handle to one task list.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    inner: Arc<Mutex<TaskState>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a pending task and return it.
    pub fn create(&self, subject: impl Into<String>, description: impl Into<String>) -> Task {
        let mut state = self.lock();
        state.next_id += 1;
        let task = Task {
            id: state.next_id.to_string(),
            subject: subject.into(),
            status: TaskStatus::Pending,
            description: description.into(),
        };
        state.tasks.push(task.clone());
        state.revision += 1;
        task
    }

    /// Apply a patch. Returns `None` for an unknown id.
    pub fn update(&self, id: &str, patch: TaskPatch) -> Option<Task> {
        let mut state = self.lock();
        let task = state.tasks.iter_mut().find(|t| t.id == id)?;
        if let Some(subject) = patch.subject {
            task.subject = subject;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        let updated = task.clone();
        state.revision += 1;
        Some(updated)
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.lock().tasks.iter().find(|t| t.id == id).cloned()
    }

    /// Snapshot of all tasks in creation order.
    pub fn list(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }
}
