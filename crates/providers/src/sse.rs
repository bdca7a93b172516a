//! Server-sent-event plumbing shared by every adapter.
//!
//! [`SseDecoder`] turns raw body chunks into `data:` payloads.
//! [`drive_stream`] pumps an HTTP body through the decoder into a
//! backend-specific [`StreamAccumulator`] while watching the cancellation
//! token.

use futures::{Stream, StreamExt};
use tandem_core::error::ProviderError;
use tandem_core::provider::{StreamObserver, StreamedResult};
use tandem_core::CancellationToken;
use tracing::warn;

const DONE_SENTINEL: &str = "[DONE]";

/// Incremental SSE line decoder.
///
/// Bytes are buffered until a full line is available, so a chunk boundary
/// may fall anywhere, including inside a multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every complete `data:` payload it finished.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_line(&line[..line.len() - 1]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a final line the server never terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');

    // Comments, `event:`, `id:` and `retry:` lines carry nothing we dispatch on.
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data).trim_end();
    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }
    Some(data.to_string())
}

/// Whether the accumulator wants more events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Backend-specific event handling on top of the shared SSE framing.
pub trait StreamAccumulator {
    /// Handle one `data:` payload. Text and reasoning deltas go to the
    /// observer before this returns.
    fn handle(&mut self, data: &str, observer: &dyn StreamObserver) -> Result<Flow, ProviderError>;

    /// Build the result once the body is exhausted or `handle` returned
    /// [`Flow::Stop`]. Backends with a terminal event fail here when it
    /// never arrived.
    fn finish(self) -> Result<StreamedResult, ProviderError>;
}

/// Read an HTTP response body to the end (or until the accumulator stops).
pub async fn drive_stream<A: StreamAccumulator>(
    response: reqwest::Response,
    accumulator: A,
    observer: &dyn StreamObserver,
    cancel: &CancellationToken,
) -> Result<StreamedResult, ProviderError> {
    drive_chunks(response.bytes_stream(), accumulator, observer, cancel).await
}

pub(crate) async fn drive_chunks<S, B, E, A>(
    chunks: S,
    mut accumulator: A,
    observer: &dyn StreamObserver,
    cancel: &CancellationToken,
) -> Result<StreamedResult, ProviderError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    A: StreamAccumulator,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut decoder = SseDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            next = chunks.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                for data in decoder.push(bytes.as_ref()) {
                    if accumulator.handle(&data, observer)? == Flow::Stop {
                        return accumulator.finish();
                    }
                }
            }
            Some(Err(e)) => return Err(ProviderError::Stream(e.to_string())),
            None => break,
        }
    }

    if let Some(data) = decoder.finish() {
        accumulator.handle(&data, observer)?;
    }
    accumulator.finish()
}

/// Send a prepared request, racing it against cancellation.
///
/// Non-2xx responses become [`ProviderError::Http`] with the raw body.
pub async fn send_request(
    provider: &str,
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, ProviderError> {
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        sent = request.send() => sent.map_err(|e| ProviderError::Network(e.to_string()))?,
    };

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        body = response.text() => body.unwrap_or_default(),
    };
    warn!(provider, status = status.as_u16(), body = %body, "Provider returned an error status");
    Err(ProviderError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Parse accumulated tool arguments. Malformed JSON yields `{}`.
pub fn parse_tool_input(tool_name: &str, raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() => value,
        Ok(other) => {
            warn!(tool = %tool_name, value = %other, "Tool arguments are not an object");
            serde_json::json!({})
        }
        Err(e) => {
            warn!(tool = %tool_name, error = %e, "Malformed tool arguments, using empty input");
            serde_json::json!({})
        }
    }
}

/// Decode one payload. A payload that is not valid JSON fails the stream;
/// unknown event kinds are left to the caller's `#[serde(other)]` variants.
pub(crate) fn parse_payload<T: serde::de::DeserializeOwned>(
    provider: &str,
    data: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(data).map_err(|e| {
        warn!(provider, error = %e, data = %data, "Malformed SSE payload");
        ProviderError::Stream(format!("{provider}: malformed event payload: {e}"))
    })
}

/// The error for a body that ended before the backend's terminal event.
pub(crate) fn truncated(provider: &str) -> ProviderError {
    warn!(provider, "Stream ended before its terminal event");
    ProviderError::Stream(format!("{provider}: stream ended unexpectedly"))
}

/// HTTP client shared by the adapters' constructors.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}
