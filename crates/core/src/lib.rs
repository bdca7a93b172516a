//! # tandem core
//!
//! Domain types, traits, and error definitions for the tandem agent
//! orchestration engine. This crate has no I/O of its own: it defines the
//! model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their
//! respective crates:
//! - [`Provider`]: one adapter per LLM backend (`tandem-providers`)
//! - [`Tool`]: executors registered in a [`ToolRegistry`] (`tandem-tools`)
//! - [`Host`]: filesystem, shell and terminal access (`tandem-tools::LocalHost`)

pub mod agent;
pub mod error;
pub mod host;
pub mod message;
pub mod provider;
pub mod task;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentState, Stats};
pub use error::{Error, HostError, ProviderError, Result, ToolError};
pub use host::{CommandOutput, DirEntry, FileStat, Host, HostInfo, NullHost};
pub use message::{ContentBlock, Conversation, Message, MessageContent, Role};
pub use provider::{
    ModelPricing, NoopObserver, Provider, ProviderCapabilities, ProviderKind, ProviderRequest,
    StopReason, StreamObserver, StreamedResult,
};
pub use task::{Task, TaskPatch, TaskStatus, TaskStore};
pub use tool::{Tool, ToolCall, ToolDefinition, ToolRegistry};

/// Cancellation token threaded through provider calls and sub-tasks.
pub use tokio_util::sync::CancellationToken;
