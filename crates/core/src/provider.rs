//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider sends one unified request to its backend, consumes the
//! streamed answer incrementally, and returns a single [`StreamedResult`].
//! Text and reasoning deltas are pushed to a [`StreamObserver`] as they
//! arrive.
//!
//! Implementations: Anthropic Messages, OpenAI-compatible chat completions,
//! Gemini `streamGenerateContent`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::message::{ContentBlock, Message};
use crate::tool::{ToolCall, ToolDefinition};

/// Which backend adapter to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" | "openai-compatible" | "openai_compat" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// A unified request, translated by each adapter into its own shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,

    /// System instructions, sent outside the conversation
    #[serde(default)]
    pub system: String,

    /// The full conversation
    pub messages: Vec<Message>,

    /// Every currently registered tool
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Maximum output tokens
    pub max_tokens: u32,

    /// Reasoning-token budget, for backends that accept one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
}

/// Why a provider call ended, in one vocabulary for all backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndTurn,
    ToolUse,
    MaxTokens,
    Error,
}

/// The outcome of one provider call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamedResult {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl StreamedResult {
    /// Joined text blocks, in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool-use requests, in the order received.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Static feature flags a backend declares. Callers consult them; the
/// client does not enforce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub streaming: bool,
    pub tool_use: bool,
    pub thinking: bool,
    pub vision: bool,
}

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    pub const fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Receives text and reasoning deltas as soon as they are decoded.
pub trait StreamObserver: Send + Sync {
    fn on_text(&self, _delta: &str) {}
    fn on_thinking(&self, _delta: &str) {}
}

/// Observer that discards every delta.
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}

/// The core Provider trait.
///
/// The agent loop calls `send_streaming()` without knowing which backend is
/// behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic").
    fn name(&self) -> &str;

    /// What this backend supports.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Price of `model`, if known.
    fn pricing(&self, _model: &str) -> Option<ModelPricing> {
        None
    }

    /// Send a request and consume the streamed answer.
    ///
    /// Cancelling `cancel` aborts the call with [`ProviderError::Cancelled`].
    async fn send_streaming(
        &self,
        request: &ProviderRequest,
        observer: &dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> Result<StreamedResult, ProviderError>;
}
