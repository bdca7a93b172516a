//! The agent loop — the heart of tandem.
//!
//! Each run follows a **Call → Act → Observe** cycle:
//!
//! 1. **Append** the user's request to the conversation
//! 2. **Call** the provider with the full conversation and every tool definition
//! 3. **If tool calls**: run them in order (permission gate, timeout), append
//!    all results as one user message, and go back to step 2
//! 4. **If text only**: return it to the caller
//!
//! The cycle stops early when the turn budget is spent, the provider fails
//! for good, or the caller cancels. Sub-tasks are independent loops started
//! through a [`SubTaskManager`].

pub mod loop_runner;
pub mod options;
pub mod permission;
pub mod retry;
pub mod subtask;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::{AgentLoop, MAX_TURNS_SENTINEL, RunOutcome};
pub use options::{AgentCallbacks, AgentOptions, DEFAULT_SYSTEM_PROMPT, ToolOutcome};
pub use permission::{GATED_TOOLS, PermissionHook, PermissionRequest};
pub use retry::{RetryEvent, RetryPolicy};
pub use subtask::{SubTaskError, SubTaskInfo, SubTaskManager, SubTaskResult, SubTaskStatus};
