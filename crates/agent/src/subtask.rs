//! Sub-task manager — independent agent loops running next to their parent.
//!
//! Each sub-task is a fresh [`AgentLoop`] sharing the parent's provider,
//! host and tools, with silent callbacks and a clamped turn budget. Results
//! are cached once a loop finishes, so `wait_for` works before and after
//! completion.
//!
//! ```text
//!   spawn ──▶ running ──(loop ends)──▶ completed
//!               │                         ▲
//!               └──── abort (cancel) ─────┘
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use serde::{Deserialize, Serialize};
use tandem_core::CancellationToken;
use tandem_core::error::Error;
use tandem_core::host::Host;
use tandem_core::provider::Provider;
use tandem_core::tool::ToolRegistry;
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

use crate::loop_runner::{AgentLoop, MAX_TURNS_SENTINEL, RunOutcome};
use crate::options::{AgentCallbacks, AgentOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    Running,
    Completed,
    Error,
}

/// Final record of a sub-task. Created once, when its loop finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskResult {
    pub id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The loop's answer, or the max-turns sentinel. Empty on error.
    pub result: String,
    pub status: SubTaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubTaskResult {
    fn failed(id: &str, prompt: &str, description: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            description: description.map(String::from),
            result: String::new(),
            status: SubTaskStatus::Error,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SubTaskError {
    #[error("Unknown sub-task: {0}")]
    UnknownId(String),
}

/// One line of [`SubTaskManager::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTaskInfo {
    pub id: String,
    pub description: Option<String>,
    pub status: SubTaskStatus,
}

type Pending = Shared<BoxFuture<'static, SubTaskResult>>;

struct RunningTask {
    prompt: String,
    description: Option<String>,
    cancel: CancellationToken,
    done: Pending,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    running: HashMap<String, RunningTask>,
    completed: HashMap<String, SubTaskResult>,
}

/// Spawns and tracks sub-task loops. Clones share the same registry.
#[derive(Clone)]
pub struct SubTaskManager {
    provider: Arc<dyn Provider>,
    host: Arc<dyn Host>,
    tools: ToolRegistry,
    options: AgentOptions,
    callbacks: AgentCallbacks,
    cancel: CancellationToken,
    registry: Arc<Mutex<Registry>>,
}

impl SubTaskManager {
    /// `options` and `callbacks` are used as given; [`AgentLoop::subtask_manager`]
    /// derives them from the parent.
    pub fn new(
        provider: Arc<dyn Provider>,
        host: Arc<dyn Host>,
        tools: ToolRegistry,
        options: AgentOptions,
        callbacks: AgentCallbacks,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            host,
            tools,
            options,
            callbacks,
            cancel,
            registry: Arc::default(),
        }
    }

    /// The same registry under a new parent token. Used after the previous
    /// token was cancelled: finished results and the id sequence carry over.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a sub-task and return its id without waiting for it.
    pub fn spawn(&self, prompt: impl Into<String>, description: Option<String>) -> String {
        let prompt = prompt.into();
        let cancel = self.cancel.child_token();
        let mut agent = AgentLoop::new(
            self.provider.clone(),
            self.host.clone(),
            self.tools.clone(),
            self.options.clone(),
        )
        .with_callbacks(self.callbacks.clone())
        .with_cancellation(cancel.clone());

        let mut registry = self.lock();
        registry.next_id += 1;
        let id = format!("subtask-{}", registry.next_id);

        let task = {
            let id = id.clone();
            let prompt = prompt.clone();
            let description = description.clone();
            let shared = self.registry.clone();
            async move {
                let outcome = AssertUnwindSafe(agent.try_run(&prompt)).catch_unwind().await;
                let result = match outcome {
                    Ok(Ok(RunOutcome::Completed(text))) => completed(&id, &prompt, &description, text),
                    Ok(Ok(RunOutcome::MaxTurnsReached)) => {
                        completed(&id, &prompt, &description, MAX_TURNS_SENTINEL.to_string())
                    }
                    Ok(Err(e)) => error_result(&id, &prompt, &description, &e),
                    Err(_) => SubTaskResult::failed(&id, &prompt, description.as_deref(), "sub-task panicked"),
                };
                info!(id = %id, status = ?result.status, "Sub-task finished");

                let mut registry = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                registry.running.remove(&id);
                registry.completed.insert(id, result.clone());
                result
            }
        };

        let handle = tokio::spawn(task);
        let done = {
            let (id, prompt, description) = (id.clone(), prompt.clone(), description.clone());
            async move {
                handle.await.unwrap_or_else(|e| {
                    SubTaskResult::failed(&id, &prompt, description.as_deref(), format!("sub-task did not finish: {e}"))
                })
            }
            .boxed()
            .shared()
        };

        // The lock is still held, so the task cannot complete before it is
        // registered as running.
        registry.running.insert(
            id.clone(),
            RunningTask {
                prompt,
                description,
                cancel,
                done,
            },
        );
        debug!(id = %id, running = registry.running.len(), "Sub-task spawned");
        id
    }

    /// Wait for one sub-task, or return its cached result if it already
    /// finished. An id this manager never issued is an error.
    pub async fn wait_for(&self, id: &str) -> Result<SubTaskResult, SubTaskError> {
        let pending = {
            let registry = self.lock();
            if let Some(result) = registry.completed.get(id) {
                return Ok(result.clone());
            }
            match registry.running.get(id) {
                Some(task) => task.done.clone(),
                None => return Err(SubTaskError::UnknownId(id.to_string())),
            }
        };
        Ok(pending.await)
    }

    /// Wait concurrently for every sub-task running right now, one result each.
    pub async fn wait_all(&self) -> Vec<SubTaskResult> {
        let pending: Vec<Pending> = self.lock().running.values().map(|t| t.done.clone()).collect();
        join_all(pending).await
    }

    /// Cancel one running sub-task. Returns false if it is not running.
    pub fn abort(&self, id: &str) -> bool {
        match self.lock().running.get(id) {
            Some(task) => {
                warn!(id = %id, "Aborting sub-task");
                task.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn abort_all(&self) {
        let registry = self.lock();
        if !registry.running.is_empty() {
            warn!(count = registry.running.len(), "Aborting all sub-tasks");
        }
        for task in registry.running.values() {
            task.cancel.cancel();
        }
    }

    pub fn status(&self, id: &str) -> Option<SubTaskStatus> {
        let registry = self.lock();
        if registry.running.contains_key(id) {
            return Some(SubTaskStatus::Running);
        }
        registry.completed.get(id).map(|r| r.status)
    }

    /// Every known sub-task, ordered by id.
    pub fn list(&self) -> Vec<SubTaskInfo> {
        let registry = self.lock();
        let running = registry.running.iter().map(|(id, t)| SubTaskInfo {
            id: id.clone(),
            description: t.description.clone().or_else(|| Some(t.prompt.clone())),
            status: SubTaskStatus::Running,
        });
        let completed = registry.completed.values().map(|r| SubTaskInfo {
            id: r.id.clone(),
            description: r.description.clone().or_else(|| Some(r.prompt.clone())),
            status: r.status,
        });
        let mut all: Vec<SubTaskInfo> = running.chain(completed).collect();
        all.sort_by_key(|info| sequence(&info.id));
        all
    }

    pub fn running_count(&self) -> usize {
        self.lock().running.len()
    }
}

fn sequence(id: &str) -> u64 {
    id.rsplit('-').next().and_then(|n| n.parse().ok()).unwrap_or(u64::MAX)
}

fn completed(id: &str, prompt: &str, description: &Option<String>, text: String) -> SubTaskResult {
    SubTaskResult {
        id: id.to_string(),
        prompt: prompt.to_string(),
        description: description.clone(),
        result: text,
        status: SubTaskStatus::Completed,
        error: None,
    }
}

fn error_result(id: &str, prompt: &str, description: &Option<String>, err: &Error) -> SubTaskResult {
    SubTaskResult::failed(id, prompt, description.as_deref(), err.to_string())
}
