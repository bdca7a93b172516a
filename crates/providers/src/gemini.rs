//! Google Gemini provider (`streamGenerateContent` with `alt=sse`).
//!
//! Gemini delivers each function call as one complete part with no call
//! identifier, so ids are synthesized here. Tool results must name the
//! function they answer, which is recovered from the earlier tool-use block.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tandem_core::error::ProviderError;
use tandem_core::message::{ContentBlock, Message, Role};
use tandem_core::provider::*;
use tandem_core::tool::ToolDefinition;
use tandem_core::CancellationToken;
use tracing::debug;

use crate::pricing;
use crate::sse::{self, Flow, StreamAccumulator};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini generative language API provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "gemini".into(),
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

    fn to_api_contents(messages: &[Message]) -> Vec<GeminiContent> {
        let mut tool_names: HashMap<String, String> = HashMap::new();
        let mut contents = Vec::with_capacity(messages.len());

        for msg in messages {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "model",
            };

            let mut parts = Vec::new();
            for block in msg.blocks() {
                match block {
                    ContentBlock::Text { text } => parts.push(Part::text(text)),
                    // Reasoning is not replayed.
                    ContentBlock::Thinking { .. } => {}
                    ContentBlock::ToolUse { id, name, input } => {
                        tool_names.insert(id, name.clone());
                        parts.push(Part {
                            function_call: Some(FunctionCall {
                                id: None,
                                name,
                                args: input,
                            }),
                            ..Part::default()
                        });
                    }
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => {
                        let name = tool_names
                            .get(&tool_use_id)
                            .cloned()
                            .unwrap_or(tool_use_id);
                        let response = if is_error {
                            serde_json::json!({ "error": content })
                        } else {
                            serde_json::json!({ "result": content })
                        };
                        parts.push(Part {
                            function_response: Some(FunctionResponse { name, response }),
                            ..Part::default()
                        });
                    }
                }
            }

            if !parts.is_empty() {
                contents.push(GeminiContent {
                    role: Some(role.into()),
                    parts,
                });
            }
        }

        contents
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut generation_config = serde_json::json!({
            "maxOutputTokens": request.max_tokens,
        });
        if let Some(budget) = request.thinking_budget {
            generation_config["thinkingConfig"] = serde_json::json!({
                "thinkingBudget": budget,
                "includeThoughts": true,
            });
        }

        let mut body = serde_json::json!({
            "contents": Self::to_api_contents(&request.messages),
            "generationConfig": generation_config,
        });

        if !request.system.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": request.system }]
            });
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!([{
                "functionDeclarations": Self::to_api_tools(&request.tools)
            }]);
        }

        body
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Provider for GeminiProvider {
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
        pricing::lookup(pricing::GEMINI, model)
    }

    async fn send_streaming(
        &self,
        request: &ProviderRequest,
        observer: &dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> Result<StreamedResult, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );
        let body = Self::build_body(request);

        debug!(provider = "gemini", model = %request.model, "Sending streaming request");

        let http = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body);

        let response = sse::send_request(&self.name, http, cancel).await?;
        sse::drive_stream(response, GeminiStream::default(), observer, cancel).await
    }
}

#[derive(Debug)]
enum OpenPart {
    Text(String),
    Thinking(String),
}

#[derive(Debug, Default)]
struct GeminiStream {
    content: Vec<ContentBlock>,
    open: Option<OpenPart>,
    finish_reason: Option<String>,
    input_tokens: u64,
    output_tokens: u64,
}

impl GeminiStream {
    fn close_open(&mut self) {
        match self.open.take() {
            Some(OpenPart::Text(text)) if !text.is_empty() => {
                self.content.push(ContentBlock::Text { text });
            }
            Some(OpenPart::Thinking(text)) if !text.is_empty() => {
                self.content.push(ContentBlock::Thinking {
                    text,
                    signature: None,
                });
            }
            _ => {}
        }
    }

    fn append_text(&mut self, text: &str, thought: bool) {
        if let (Some(OpenPart::Text(buf)), false) | (Some(OpenPart::Thinking(buf)), true) =
            (self.open.as_mut(), thought)
        {
            buf.push_str(text);
            return;
        }

        self.close_open();
        self.open = Some(if thought {
            OpenPart::Thinking(text.to_string())
        } else {
            OpenPart::Text(text.to_string())
        });
    }
}

impl StreamAccumulator for GeminiStream {
    fn handle(&mut self, data: &str, observer: &dyn StreamObserver) -> Result<Flow, ProviderError> {
        let chunk = sse::parse_payload::<StreamChunk>("gemini", data)?;

        if let Some(error) = chunk.error {
            return Err(ProviderError::Stream(format!(
                "{}: {}",
                error.status, error.message
            )));
        }

        if let Some(usage) = chunk.usage_metadata {
            self.input_tokens = usage.prompt_token_count;
            self.output_tokens = usage.candidates_token_count + usage.thoughts_token_count;
        }

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return Ok(Flow::Continue);
        };

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(call) = part.function_call {
                self.close_open();
                let id = call
                    .id
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                let input = if call.args.is_object() {
                    call.args
                } else {
                    serde_json::json!({})
                };
                self.content.push(ContentBlock::ToolUse {
                    id,
                    name: call.name,
                    input,
                });
            } else if let Some(text) = part.text {
                if text.is_empty() {
                    continue;
                }
                if part.thought {
                    observer.on_thinking(&text);
                } else {
                    observer.on_text(&text);
                }
                self.append_text(&text, part.thought);
            }
        }

        if candidate.finish_reason.is_some() {
            self.finish_reason = candidate.finish_reason;
        }
        Ok(Flow::Continue)
    }

    fn finish(mut self) -> Result<StreamedResult, ProviderError> {
        // The last chunk of a complete response carries `finishReason`.
        if self.finish_reason.is_none() {
            return Err(sse::truncated("gemini"));
        }
        self.close_open();

        let has_tool_use = self
            .content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }));
        let stop_reason = if has_tool_use {
            StopReason::ToolUse
        } else {
            map_finish_reason(self.finish_reason.as_deref())
        };

        Ok(StreamedResult {
            content: self.content,
            stop_reason,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        })
    }
}

fn map_finish_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("MAX_TOKENS") => StopReason::MaxTokens,
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT")
        | Some("SPII") | Some("MALFORMED_FUNCTION_CALL") => StopReason::Error,
        _ => StopReason::EndTurn,
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    thoughts_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}
