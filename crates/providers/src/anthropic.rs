//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly (not an OpenAI-compatible proxy).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Streaming via typed SSE events (`content_block_start/delta/stop`)
//! - Extended thinking with signed thinking blocks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tandem_core::error::ProviderError;
use tandem_core::message::{ContentBlock, Message, MessageContent, Role};
use tandem_core::provider::*;
use tandem_core::tool::ToolDefinition;
use tandem_core::CancellationToken;
use tracing::debug;

use crate::pricing;
use crate::sse::{self, Flow, StreamAccumulator};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: sse::http_client(),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert messages to Anthropic API format with content blocks.
    fn to_api_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                let content = match &msg.content {
                    MessageContent::Text(text) => AnthropicContent::Text(text.clone()),
                    MessageContent::Blocks(blocks) => {
                        AnthropicContent::Blocks(blocks.iter().filter_map(Self::to_api_block).collect())
                    }
                };
                AnthropicMessage {
                    role: role.into(),
                    content,
                }
            })
            .collect()
    }

    fn to_api_block(block: &ContentBlock) -> Option<ApiBlock> {
        Some(match block {
            ContentBlock::Text { text } => ApiBlock::Text { text: text.clone() },
            // Unsigned reasoning cannot be replayed; the API rejects it.
            ContentBlock::Thinking { text, signature } => ApiBlock::Thinking {
                thinking: text.clone(),
                signature: signature.clone()?,
            },
            ContentBlock::ToolUse { id, name, input } => ApiBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => ApiBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            },
        })
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "max_tokens": request.max_tokens,
            "stream": true,
        });

        if !request.system.is_empty() {
            body["system"] = serde_json::json!(request.system);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        if let Some(budget) = request.thinking_budget {
            body["thinking"] = serde_json::json!({
                "type": "enabled",
                "budget_tokens": budget
            });
        }

        body
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_use: true,
            thinking: true,
            vision: true,
        }
    }

    fn pricing(&self, model: &str) -> Option<ModelPricing> {
        pricing::lookup(pricing::ANTHROPIC, model)
    }

    async fn send_streaming(
        &self,
        request: &ProviderRequest,
        observer: &dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> Result<StreamedResult, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::build_body(request);

        debug!(provider = "anthropic", model = %request.model, "Sending streaming request");

        let http = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body);

        let response = sse::send_request(&self.name, http, cancel).await?;
        sse::drive_stream(response, AnthropicStream::default(), observer, cancel).await
    }
}

/// A content block still receiving deltas.
#[derive(Debug)]
enum OpenBlock {
    Text(String),
    Thinking { text: String, signature: Option<String> },
    ToolUse { id: String, name: String, json: String },
}

impl OpenBlock {
    fn finalize(self) -> Option<ContentBlock> {
        match self {
            OpenBlock::Text(text) if text.is_empty() => None,
            OpenBlock::Text(text) => Some(ContentBlock::Text { text }),
            OpenBlock::Thinking { text, signature } => {
                if text.is_empty() && signature.is_none() {
                    None
                } else {
                    Some(ContentBlock::Thinking { text, signature })
                }
            }
            OpenBlock::ToolUse { id, name, json } => {
                let input = sse::parse_tool_input(&name, &json);
                Some(ContentBlock::ToolUse { id, name, input })
            }
        }
    }
}

/// Per-call stream state: one open accumulator per block index.
#[derive(Debug, Default)]
struct AnthropicStream {
    open: BTreeMap<usize, OpenBlock>,
    finished: BTreeMap<usize, ContentBlock>,
    stop_reason: Option<String>,
    input_tokens: u64,
    output_tokens: u64,
    stopped: bool,
}

impl AnthropicStream {
    fn close(&mut self, index: usize) {
        if let Some(block) = self.open.remove(&index).and_then(OpenBlock::finalize) {
            self.finished.insert(index, block);
        }
    }
}

impl StreamAccumulator for AnthropicStream {
    fn handle(&mut self, data: &str, observer: &dyn StreamObserver) -> Result<Flow, ProviderError> {
        let event = sse::parse_payload::<StreamEvent>("anthropic", data)?;

        match event {
            StreamEvent::MessageStart { message } => {
                self.input_tokens = message.usage.input_tokens;
                self.output_tokens = message.usage.output_tokens;
            }
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                let block = match content_block {
                    BlockStart::Text { text } => {
                        if !text.is_empty() {
                            observer.on_text(&text);
                        }
                        OpenBlock::Text(text)
                    }
                    BlockStart::Thinking {
                        thinking,
                        signature,
                    } => OpenBlock::Thinking {
                        text: thinking,
                        signature,
                    },
                    BlockStart::ToolUse { id, name } => OpenBlock::ToolUse {
                        id,
                        name,
                        json: String::new(),
                    },
                    BlockStart::Unknown => return Ok(Flow::Continue),
                };
                self.open.insert(index, block);
            }
            StreamEvent::ContentBlockDelta { index, delta } => {
                match (self.open.get_mut(&index), delta) {
                    (Some(OpenBlock::Text(text)), BlockDelta::TextDelta { text: delta }) => {
                        observer.on_text(&delta);
                        text.push_str(&delta);
                    }
                    (
                        Some(OpenBlock::Thinking { text, .. }),
                        BlockDelta::ThinkingDelta { thinking },
                    ) => {
                        observer.on_thinking(&thinking);
                        text.push_str(&thinking);
                    }
                    (
                        Some(OpenBlock::Thinking { signature, .. }),
                        BlockDelta::SignatureDelta { signature: sig },
                    ) => {
                        signature.get_or_insert_with(String::new).push_str(&sig);
                    }
                    (
                        Some(OpenBlock::ToolUse { json, .. }),
                        BlockDelta::InputJsonDelta { partial_json },
                    ) => json.push_str(&partial_json),
                    (block, delta) => {
                        debug!(index, ?delta, open = block.is_some(), "Unmatched Anthropic delta");
                    }
                }
            }
            StreamEvent::ContentBlockStop { index } => self.close(index),
            StreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if let Some(usage) = usage {
                    if let Some(input) = usage.input_tokens {
                        self.input_tokens = input;
                    }
                    if let Some(output) = usage.output_tokens {
                        self.output_tokens = output;
                    }
                }
            }
            StreamEvent::MessageStop => {
                self.stopped = true;
                return Ok(Flow::Stop);
            }
            StreamEvent::Error { error } => {
                return Err(ProviderError::Stream(format!(
                    "{}: {}",
                    error.kind, error.message
                )));
            }
            StreamEvent::Ping | StreamEvent::Unknown => {}
        }
        Ok(Flow::Continue)
    }

    fn finish(mut self) -> Result<StreamedResult, ProviderError> {
        if !self.stopped {
            return Err(sse::truncated("anthropic"));
        }
        let pending: Vec<usize> = self.open.keys().copied().collect();
        for index in pending {
            self.close(index);
        }

        Ok(StreamedResult {
            content: self.finished.into_values().collect(),
            stop_reason: map_stop_reason(self.stop_reason.as_deref()),
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        })
    }
}

fn map_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("refusal") => StopReason::Error,
        _ => StopReason::EndTurn,
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ApiBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        signature: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart {
        message: MessageStartBody,
    },
    ContentBlockStart {
        index: usize,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<UsageDelta>,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageStartBody {
    #[serde(default)]
    usage: StartUsage,
}

#[derive(Debug, Default, Deserialize)]
struct StartUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageDelta {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}
