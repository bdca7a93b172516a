//! LLM provider implementations for tandem.
//!
//! All providers implement the `tandem_core::Provider` trait on top of the
//! shared SSE framing in [`sse`]. The factory selects the adapter from
//! configuration.

pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod openai_compat;
pub mod pricing;
pub mod sse;

pub use anthropic::AnthropicProvider;
pub use factory::{build_from_config, create_provider};
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use tandem_config::ProviderSettings;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use tandem_core::provider::StreamObserver;

    /// Frame payloads as an SSE body, one event per payload.
    pub fn sse_body(payloads: &[&str]) -> String {
        payloads
            .iter()
            .map(|p| format!("data: {p}\n\n"))
            .collect()
    }

    type Chunks = futures::stream::Iter<std::vec::IntoIter<Result<Vec<u8>, std::io::Error>>>;

    /// The whole body as a single chunk.
    pub fn one_chunk(body: &str) -> Chunks {
        futures::stream::iter(vec![Ok(body.as_bytes().to_vec())])
    }

    /// The body one byte per chunk, so every boundary falls mid-token.
    pub fn byte_chunks(body: &str) -> Chunks {
        futures::stream::iter(body.bytes().map(|b| Ok(vec![b])).collect::<Vec<_>>())
    }

    /// Records every delta it is pushed.
    #[derive(Default)]
    pub struct RecordingObserver {
        text: Mutex<String>,
        thinking: Mutex<String>,
    }

    impl RecordingObserver {
        pub fn text(&self) -> String {
            self.text.lock().unwrap().clone()
        }

        pub fn thinking(&self) -> String {
            self.thinking.lock().unwrap().clone()
        }
    }

    impl StreamObserver for RecordingObserver {
        fn on_text(&self, delta: &str) {
            self.text.lock().unwrap().push_str(delta);
        }

        fn on_thinking(&self, delta: &str) {
            self.thinking.lock().unwrap().push_str(delta);
        }
    }
}
