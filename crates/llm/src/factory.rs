//! LLM provider factory.
//!
//! Builds a client from the resolved provider name, endpoint and key.
//! Missing credentials are reported here, before any network call.

use crate::client::LlmClient;
use crate::providers::{AnthropicClient, MockClient, OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use chatloop_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("claude", "openai", "ollama", "mock")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key, required for hosted providers
///
/// # Errors
/// Returns a configuration error if the provider is unknown or a required
/// API key is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    let api_key = api_key.filter(|k| !k.trim().is_empty());

    tracing::debug!("Creating {} client (endpoint: {:?})", provider_type, endpoint);

    let client: Arc<dyn LlmClient> = match (provider_type, api_key) {
        (ProviderType::Claude, Some(key)) => match endpoint {
            Some(url) => Arc::new(AnthropicClient::with_base_url(key, url)),
            None => Arc::new(AnthropicClient::new(key)),
        },
        (ProviderType::OpenAI, Some(key)) => match endpoint {
            Some(url) => Arc::new(OpenAiClient::with_base_url(key, url)),
            None => Arc::new(OpenAiClient::new(key)),
        },
        (ProviderType::Ollama, _) => match endpoint {
            Some(url) => Arc::new(OllamaClient::with_base_url(url)),
            None => Arc::new(OllamaClient::new()),
        },
        (ProviderType::Mock, _) => Arc::new(MockClient::new()),
        (other, None) => {
            return Err(AppError::Config(format!(
                "{} provider requires an API key",
                other
            )))
        }
    };

    Ok(client)
}
