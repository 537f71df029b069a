/// Endpoint defaults for an OpenAI-compatible provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPreset {
    pub default_base_url: &'static str,
    pub needs_api_key: bool,
}

/// Look up a provider preset by lowercase name.
///
/// `azure-openai` has no preset: every deployment has its own endpoint, so
/// `base_url` must be configured.
pub fn get_preset(provider: &str) -> Option<ProviderPreset> {
    match provider {
        "openai" => Some(ProviderPreset {
            default_base_url: "https://api.openai.com/v1/chat/completions",
            needs_api_key: true,
        }),
        "ollama" => Some(ProviderPreset {
            default_base_url: "http://localhost:11434/v1/chat/completions",
            needs_api_key: false,
        }),
        "vllm" => Some(ProviderPreset {
            default_base_url: "http://localhost:8000/v1/chat/completions",
            needs_api_key: false,
        }),
        "lmstudio" => Some(ProviderPreset {
            default_base_url: "http://localhost:1234/v1/chat/completions",
            needs_api_key: false,
        }),
        "groq" => Some(ProviderPreset {
            default_base_url: "https://api.groq.com/openai/v1/chat/completions",
            needs_api_key: true,
        }),
        "together" => Some(ProviderPreset {
            default_base_url: "https://api.together.xyz/v1/chat/completions",
            needs_api_key: true,
        }),
        "openrouter" => Some(ProviderPreset {
            default_base_url: "https://openrouter.ai/api/v1/chat/completions",
            needs_api_key: true,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_presets_need_no_key() {
        let ollama = get_preset("ollama").unwrap();
        assert_eq!(ollama.default_base_url, "http://localhost:11434/v1/chat/completions");
        assert!(!ollama.needs_api_key);
        assert!(get_preset("groq").unwrap().needs_api_key);
    }

    #[test]
    fn test_azure_has_no_preset() {
        assert!(get_preset("azure-openai").is_none());
        assert!(get_preset("anthropic").is_none());
    }
}
