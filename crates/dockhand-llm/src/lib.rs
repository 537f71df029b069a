pub mod providers;
pub mod retry;
pub mod streaming;

use dockhand_core::config::ModelConfig;
use dockhand_core::error::{DockhandError, Result};
use dockhand_core::traits::LlmClient;
use tracing::warn;

pub use providers::openai::OpenAiClient;
pub use providers::presets::{get_preset, ProviderPreset};
pub use retry::RetryingClient;

/// Providers that speak the OpenAI chat-completions wire format.
const OPENAI_COMPATIBLE: &[&str] = &[
    "openai",
    "azure-openai",
    "ollama",
    "vllm",
    "groq",
    "together",
    "openrouter",
    "lmstudio",
];

/// Create an LLM client based on the provider name. Without a `base_url`
/// the client posts to the provider's preset endpoint.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    let provider = config.provider.to_ascii_lowercase();
    if !OPENAI_COMPATIBLE.contains(&provider.as_str()) {
        return Err(DockhandError::UnsupportedProvider(config.provider.clone()));
    }

    let preset = get_preset(&provider);
    if preset.is_some_and(|p| p.needs_api_key) && config.api_key.is_none() {
        warn!(provider = %provider, model = %config.model_id, "No API key configured");
    }

    match (preset, config.base_url.as_deref()) {
        (_, Some(_)) => Ok(Box::new(OpenAiClient::new())),
        (Some(preset), None) => Ok(Box::new(OpenAiClient::with_default_url(
            preset.default_base_url,
        ))),
        (None, None) => Err(DockhandError::Config(format!(
            "provider '{}' requires base_url",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_openai_compatible() {
        let mut config = ModelConfig::default();
        assert!(create_client(&config).is_ok());

        config.provider = "Ollama".into();
        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn test_azure_without_base_url_is_config_error() {
        let mut config = ModelConfig {
            provider: "azure-openai".into(),
            ..ModelConfig::default()
        };
        let err = create_client(&config).err().unwrap();
        assert!(matches!(err, DockhandError::Config(msg) if msg.contains("base_url")));

        config.base_url = Some("https://example.openai.azure.com/openai/deployments/gpt4o/chat/completions?api-version=2024-06-01".into());
        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn test_create_client_unknown_provider() {
        let config = ModelConfig {
            provider: "anthropic".into(),
            ..ModelConfig::default()
        };
        let err = create_client(&config).err().unwrap();
        assert!(matches!(err, DockhandError::UnsupportedProvider(p) if p == "anthropic"));
    }
}
