//! Loop options and the caller-facing callback surface.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tandem_config::AppConfig;
use tandem_core::agent::Stats;
use tandem_core::error::Error;
use tandem_core::provider::StreamObserver;
use tandem_core::task::Task;
use tandem_core::tool::ToolCall;

use crate::permission::PermissionHook;
use crate::retry::{RetryEvent, RetryPolicy};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are tandem, a coding assistant working in the user's \
project directory. Use the tools to inspect and change files and to run commands. Keep a task \
list for multi-step work. Be concise, and report what you changed.";

/// Turn budget ceiling for sub-tasks.
pub const SUBTASK_TURN_CAP: u32 = 20;

/// Everything that shapes one agent loop, independent of where it runs.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub thinking_budget: Option<u32>,
    /// Provider calls allowed per `run`.
    pub max_turns: u32,
    pub tool_timeout: Duration,
    pub retry: RetryPolicy,
    pub subtask_max_turns: u32,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_tokens: 8192,
            thinking_budget: None,
            max_turns: 50,
            tool_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            subtask_max_turns: SUBTASK_TURN_CAP,
        }
    }
}

impl AgentOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let agent = &config.agent;
        Self {
            model: config.model.clone(),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.into()),
            max_tokens: config.max_tokens,
            thinking_budget: config.thinking_budget,
            max_turns: agent.max_turns,
            tool_timeout: Duration::from_secs(agent.tool_timeout_secs),
            retry: RetryPolicy {
                max_retries: agent.max_retries,
                initial_delay: Duration::from_millis(agent.retry_initial_delay_ms),
            },
            subtask_max_turns: agent.subtask_max_turns,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_turns(mut self, max: u32) -> Self {
        self.max_turns = max;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Options for a sub-task spawned by a loop with these options.
    pub fn for_subtask(&self) -> Self {
        let cap = self.subtask_max_turns.min(SUBTASK_TURN_CAP);
        Self {
            max_turns: self.max_turns.min(cap),
            ..self.clone()
        }
    }
}

/// How a tool call ended, as reported to `on_tool_end`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
    pub duration: Duration,
}

pub type TextCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type ToolStartCallback = Arc<dyn Fn(&ToolCall) + Send + Sync>;
pub type ToolEndCallback = Arc<dyn Fn(&ToolCall, &ToolOutcome) + Send + Sync>;
pub type RetryCallback = Arc<dyn Fn(&RetryEvent) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;
pub type StatsCallback = Arc<dyn Fn(&Stats) + Send + Sync>;
pub type TaskUpdateCallback = Arc<dyn Fn(&[Task]) + Send + Sync>;

/// Notifications the loop sends to its caller. Every handle is optional.
#[derive(Clone, Default)]
pub struct AgentCallbacks {
    pub on_text: Option<TextCallback>,
    pub on_thinking: Option<TextCallback>,
    pub on_tool_start: Option<ToolStartCallback>,
    pub on_tool_end: Option<ToolEndCallback>,
    pub on_retry: Option<RetryCallback>,
    pub on_error: Option<ErrorCallback>,
    pub on_stats: Option<StatsCallback>,
    pub on_task_update: Option<TaskUpdateCallback>,
    /// Asked before any gated tool runs. Without one, gated tools run freely.
    pub permission: Option<Arc<dyn PermissionHook>>,
}

impl AgentCallbacks {
    /// Keep only the error callback and the permission hook.
    pub fn silent(&self) -> Self {
        Self {
            on_error: self.on_error.clone(),
            permission: self.permission.clone(),
            ..Self::default()
        }
    }

    pub(crate) fn tool_start(&self, call: &ToolCall) {
        if let Some(f) = &self.on_tool_start {
            f(call);
        }
    }

    pub(crate) fn tool_end(&self, call: &ToolCall, outcome: &ToolOutcome) {
        if let Some(f) = &self.on_tool_end {
            f(call, outcome);
        }
    }

    pub(crate) fn retry(&self, event: &RetryEvent) {
        if let Some(f) = &self.on_retry {
            f(event);
        }
    }

    pub(crate) fn error(&self, err: &Error) {
        if let Some(f) = &self.on_error {
            f(err);
        }
    }

    pub(crate) fn stats(&self, stats: &Stats) {
        if let Some(f) = &self.on_stats {
            f(stats);
        }
    }

    pub(crate) fn task_update(&self, tasks: &[Task]) {
        if let Some(f) = &self.on_task_update {
            f(tasks);
        }
    }
}

impl fmt::Debug for AgentCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCallbacks")
            .field("on_text", &self.on_text.is_some())
            .field("on_thinking", &self.on_thinking.is_some())
            .field("on_tool_start", &self.on_tool_start.is_some())
            .field("on_tool_end", &self.on_tool_end.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_stats", &self.on_stats.is_some())
            .field("on_task_update", &self.on_task_update.is_some())
            .field("permission", &self.permission.is_some())
            .finish()
    }
}

/// Forwards provider deltas to the text and thinking callbacks.
pub(crate) struct CallbackObserver<'a>(pub &'a AgentCallbacks);

impl StreamObserver for CallbackObserver<'_> {
    fn on_text(&self, delta: &str) {
        if let Some(f) = &self.0.on_text {
            f(delta);
        }
    }

    fn on_thinking(&self, delta: &str) {
        if let Some(f) = &self.0.on_thinking {
            f(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn options_from_config() {
        let mut config = AppConfig::default();
        config.model = "gpt-4o".into();
        config.agent.max_turns = 12;
        config.agent.tool_timeout_secs = 5;
        config.agent.retry_initial_delay_ms = 250;

        let options = AgentOptions::from_config(&config);
        assert_eq!(options.model, "gpt-4o");
        assert_eq!(options.max_turns, 12);
        assert_eq!(options.tool_timeout, Duration::from_secs(5));
        assert_eq!(options.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(options.retry.max_retries, 3);
        assert_eq!(options.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn subtask_budget_is_clamped() {
        let options = AgentOptions::default();
        assert_eq!(options.for_subtask().max_turns, 20);

        let small = AgentOptions::default().with_max_turns(4);
        assert_eq!(small.for_subtask().max_turns, 4);

        let mut generous = AgentOptions::default();
        generous.subtask_max_turns = 100;
        assert_eq!(generous.for_subtask().max_turns, 20);
    }

    #[test]
    fn silent_keeps_error_and_permission() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = seen.clone();
        let callbacks = AgentCallbacks {
            on_text: Some(Arc::new(|_: &str| {})),
            on_stats: Some(Arc::new(|_: &Stats| {})),
            on_error: Some(Arc::new(move |e: &Error| sink.lock().unwrap().push(e.to_string()))),
            permission: Some(Arc::new(|_: &crate::PermissionRequest| true)),
            ..AgentCallbacks::default()
        };

        let silent = callbacks.silent();
        assert!(silent.on_text.is_none());
        assert!(silent.on_stats.is_none());
        assert!(silent.permission.is_some());

        silent.error(&Error::Internal("boom".into()));
        assert_eq!(seen.lock().unwrap().as_slice(), ["Internal error: boom"]);
    }

    #[test]
    fn observer_forwards_deltas() {
        let text = Arc::new(Mutex::new(String::new()));
        let sink = text.clone();
        let callbacks = AgentCallbacks {
            on_text: Some(Arc::new(move |d: &str| sink.lock().unwrap().push_str(d))),
            ..AgentCallbacks::default()
        };
        let observer = CallbackObserver(&callbacks);
        observer.on_text("Hel");
        observer.on_text("lo");
        observer.on_thinking("ignored");
        assert_eq!(*text.lock().unwrap(), "Hello");
    }
}
