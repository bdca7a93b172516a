//! Shared test helpers for loop and sub-task tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tandem_core::CancellationToken;
use tandem_core::error::ProviderError;
use tandem_core::message::ContentBlock;
use tandem_core::provider::{
    Provider, ProviderCapabilities, ProviderRequest, StopReason, StreamObserver, StreamedResult,
};

type Responder = Box<dyn Fn(&ProviderRequest) -> Result<StreamedResult, ProviderError> + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<Result<StreamedResult, ProviderError>>>),
    Fn(Responder),
}

/// A provider that answers from a script and records every request.
///
/// Text blocks of each answer are replayed through the observer. Panics if a
/// queue runs dry.
pub struct ScriptedProvider {
    script: Script,
    delay: Option<Duration>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<StreamedResult, ProviderError>>) -> Self {
        Self::with_script(Script::Queue(Mutex::new(responses.into())))
    }

    /// Answer each request by inspecting it; useful when calls race.
    pub fn from_fn(
        f: impl Fn(&ProviderRequest) -> Result<StreamedResult, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self::with_script(Script::Fn(Box::new(f)))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, abortable through the cancellation token.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_use: true,
            thinking: false,
            vision: false,
        }
    }

    async fn send_streaming(
        &self,
        request: &ProviderRequest,
        observer: &dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> Result<StreamedResult, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let result = match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("ScriptedProvider: no response for call #{}", self.call_count())),
            Script::Fn(f) => f(request),
        }?;

        for block in &result.content {
            if let ContentBlock::Text { text } = block {
                observer.on_text(text);
            }
        }
        Ok(result)
    }
}

/// A final answer with fixed usage (10 in, 5 out).
pub fn text_response(text: &str) -> StreamedResult {
    StreamedResult {
        content: vec![ContentBlock::text(text)],
        stop_reason: StopReason::EndTurn,
        input_tokens: 10,
        output_tokens: 5,
    }
}

/// A tool-use turn with one block per `(id, name, input)`.
pub fn tool_response(calls: &[(&str, &str, serde_json::Value)]) -> StreamedResult {
    StreamedResult {
        content: calls
            .iter()
            .map(|(id, name, input)| ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input: input.clone(),
            })
            .collect(),
        stop_reason: StopReason::ToolUse,
        input_tokens: 20,
        output_tokens: 8,
    }
}

pub fn http_error(status: u16) -> ProviderError {
    ProviderError::Http {
        status,
        body: format!("status {status}"),
    }
}
