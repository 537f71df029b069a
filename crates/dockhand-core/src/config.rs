use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DockhandError, Result};

/// Top-level Dockhand configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum node executions in a single graph invocation.
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
    /// Wall-clock budget per invocation; `0` disables it.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_parallel_tools")]
    pub parallel_tools: bool,
    /// Directory tools resolve relative paths against.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
            max_duration_secs: default_max_duration(),
            system_prompt: None,
            parallel_tools: default_parallel_tools(),
            working_dir: default_working_dir(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

fn default_recursion_limit() -> usize { 25 }
fn default_max_duration() -> u64 { 600 }
fn default_parallel_tools() -> bool { true }
fn default_working_dir() -> String { ".".to_string() }

/// Where thread transcripts are kept between invocations.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    #[default]
    Memory,
    Sqlite,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub backend: CheckpointBackend,
    /// Database file for the sqlite backend, relative to the working dir.
    #[serde(default = "default_checkpoint_path")]
    pub path: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::default(),
            path: default_checkpoint_path(),
        }
    }
}

fn default_checkpoint_path() -> String { ".dockhand/checkpoints.db".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

/// Providers that may borrow `OPENAI_API_KEY` when no key is configured.
const OPENAI_KEY_PROVIDERS: &[&str] = &["openai", "azure-openai"];

impl ModelConfig {
    /// Fill a missing API key from `OPENAI_API_KEY`. Other providers keep
    /// whatever they were configured with.
    pub fn resolve_api_key(&mut self) {
        if self.api_key.as_deref().map_or(false, |k| !k.is_empty()) {
            return;
        }
        let provider = self.provider.to_ascii_lowercase();
        if OPENAI_KEY_PROVIDERS.contains(&provider.as_str()) {
            self.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_model_id() -> String { "gpt-4o-2024-08-06".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// How the Dockerfile tools behave.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    /// Canned responses; nothing touches the disk.
    #[default]
    Placeholder,
    /// Read and write real files under the working dir.
    Workspace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub mode: ToolMode,
    /// Dockerfile path used by `read_dockerfile` / `write_dockerfile` in workspace mode.
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            mode: ToolMode::default(),
            dockerfile: default_dockerfile(),
        }
    }
}

fn default_dockerfile() -> String { "Dockerfile".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| DockhandError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let mut config: Self =
            toml::from_str(&expanded).map_err(|e| DockhandError::Config(e.to_string()))?;
        config.resolve_api_keys();
        debug!(path = %path.display(), model = %config.model.model_id, "Config loaded");
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        debug!(path = %path.display(), "No config file, using defaults");
        let mut config = Self::default();
        config.resolve_api_keys();
        Ok(config)
    }

    /// Resolve keys for the primary model and every fallback.
    pub fn resolve_api_keys(&mut self) {
        self.model.resolve_api_key();
        for fallback in &mut self.fallback_models {
            fallback.resolve_api_key();
        }
    }

    /// Resolve the working directory (expand ~).
    pub fn working_dir(&self) -> PathBuf {
        let dir = &self.agent.working_dir;
        if let Some(rest) = dir.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(dir)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_DOCKHAND_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_DOCKHAND_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_DOCKHAND_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_DOCKHAND_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_DOCKHAND_VAR}\"");
    }

    #[test]
    fn test_empty_toml_matches_fixed_model() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.model.model_id, "gpt-4o-2024-08-06");
        assert_eq!(config.model.temperature, 0.0);
        assert_eq!(config.agent.recursion_limit, 25);
        assert!(config.agent.parallel_tools);
        assert_eq!(config.agent.checkpoint.backend, CheckpointBackend::Memory);
        assert_eq!(config.tools.mode, ToolMode::Placeholder);
        assert_eq!(config.tools.dockerfile, "Dockerfile");
        assert!(config.fallback_models.is_empty());
    }

    #[test]
    fn test_enum_fields_parse_lowercase() {
        let toml_str = r#"
[agent.checkpoint]
backend = "sqlite"
path = "state/cp.db"

[tools]
mode = "workspace"
dockerfile = "build/Dockerfile"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agent.checkpoint.backend, CheckpointBackend::Sqlite);
        assert_eq!(config.agent.checkpoint.path, "state/cp.db");
        assert_eq!(config.tools.mode, ToolMode::Workspace);
        assert_eq!(config.tools.dockerfile, "build/Dockerfile");
    }

    #[test]
    fn test_explicit_api_key_is_kept() {
        let mut model = ModelConfig {
            api_key: Some("sk-configured".into()),
            ..ModelConfig::default()
        };
        model.resolve_api_key();
        assert_eq!(model.api_key.as_deref(), Some("sk-configured"));
    }

    #[test]
    fn test_working_dir_expands_home() {
        let mut config = AppConfig::default();
        config.agent.working_dir = "~/project".into();
        if let Some(home) = dirs_home() {
            assert_eq!(config.working_dir(), home.join("project"));
        }

        config.agent.working_dir = "/srv/app".into();
        assert_eq!(config.working_dir(), PathBuf::from("/srv/app"));
    }

    #[test]
    fn test_config_serializes_back_to_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("gpt-4o-2024-08-06"));
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.model.model_id, config.model.model_id);
    }
}
