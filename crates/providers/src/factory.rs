//! Provider factory — builds the configured backend adapter.

use std::sync::Arc;
use tandem_config::{AppConfig, ProviderSettings};
use tandem_core::error::ProviderError;
use tandem_core::provider::{Provider, ProviderKind};
use tracing::debug;

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the adapter described by `settings`.
///
/// A missing API key is an error, except for an OpenAI-compatible endpoint
/// with a custom base URL (local servers usually take no key).
pub fn create_provider(settings: &ProviderSettings) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = settings.api_key.clone().unwrap_or_default();
    let keyless_ok = settings.kind == ProviderKind::OpenAi && settings.base_url.is_some();
    if api_key.is_empty() && !keyless_ok {
        return Err(ProviderError::NotConfigured(format!(
            "no API key for {} (set {} or TANDEM_API_KEY)",
            settings.kind,
            AppConfig::api_key_var(settings.kind)
        )));
    }

    debug!(provider = %settings.kind, model = %settings.model, "Creating provider");

    let provider: Arc<dyn Provider> = match settings.kind {
        ProviderKind::Anthropic => {
            let mut p = AnthropicProvider::new(api_key);
            if let Some(url) = &settings.base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderKind::OpenAi => Arc::new(OpenAiCompatProvider::new(
            "openai",
            default_base_url(settings),
            api_key,
        )),
        ProviderKind::Gemini => {
            let mut p = GeminiProvider::new(api_key);
            if let Some(url) = &settings.base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
    };

    Ok(provider)
}

/// Shortcut for `create_provider(&config.provider_settings())`.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    create_provider(&config.provider_settings())
}

fn default_base_url(settings: &ProviderSettings) -> String {
    settings.base_url.clone().unwrap_or_else(|| match settings.kind {
        ProviderKind::Anthropic => crate::anthropic::DEFAULT_BASE_URL.into(),
        ProviderKind::OpenAi => crate::openai_compat::DEFAULT_BASE_URL.into(),
        ProviderKind::Gemini => crate::gemini::DEFAULT_BASE_URL.into(),
    })
}
