use std::io::Write;

use dockhand_core::config::{AppConfig, CheckpointBackend, ToolMode};
use dockhand_core::error::DockhandError;
use dockhand_test_utils::write_config_file;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[agent]
recursion_limit = 12
max_duration_secs = 90
system_prompt = "You are a Dockerfile expert."
parallel_tools = false
working_dir = "/tmp/dockhand-test"

[agent.checkpoint]
backend = "sqlite"
path = "state/threads.db"

[model]
provider = "openai"
model_id = "gpt-4o-2024-08-06"
api_key = "sk-test-key"
base_url = "http://localhost:8080/v1"
max_tokens = 2048
temperature = 0.0

[model.retry]
max_retries = 5
initial_backoff_ms = 200
max_backoff_ms = 2000

[[fallback_models]]
provider = "ollama"
model_id = "llama3.2"

[tools]
mode = "workspace"
dockerfile = "docker/Dockerfile"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.agent.recursion_limit, 12);
    assert_eq!(config.agent.max_duration_secs, 90);
    assert_eq!(
        config.agent.system_prompt.as_deref(),
        Some("You are a Dockerfile expert.")
    );
    assert!(!config.agent.parallel_tools);
    assert_eq!(config.agent.checkpoint.backend, CheckpointBackend::Sqlite);
    assert_eq!(config.agent.checkpoint.path, "state/threads.db");

    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 2048);
    assert_eq!(config.model.temperature, 0.0);
    let retry = config.model.retry.expect("retry present");
    assert_eq!(retry.max_retries, 5);

    assert_eq!(config.fallback_models.len(), 1);
    assert_eq!(config.fallback_models[0].provider, "ollama");

    assert_eq!(config.tools.mode, ToolMode::Workspace);
    assert_eq!(config.tools.dockerfile, "docker/Dockerfile");
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("DOCKHAND_TEST_API_KEY", "expanded-key-value");

    let toml_content = r#"
[model]
model_id = "test-model"
api_key = "${DOCKHAND_TEST_API_KEY}"
"#;

    let tmp = write_config_file(toml_content);
    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.api_key, Some("expanded-key-value".to_string()));

    std::env::remove_var("DOCKHAND_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[model]
model_id = "gpt-4o-mini"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "openai");
    assert_eq!(config.model.temperature, 0.0);
    assert_eq!(config.agent.recursion_limit, 25);
    assert_eq!(config.agent.max_duration_secs, 600);
    assert!(config.agent.parallel_tools);
    assert_eq!(config.agent.checkpoint.backend, CheckpointBackend::Memory);
    assert_eq!(config.tools.mode, ToolMode::Placeholder);
    assert!(config.fallback_models.is_empty());
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("dockhand.toml");

    let err = AppConfig::load(&path).unwrap_err();
    assert!(matches!(err, DockhandError::ConfigNotFound(_)));

    let config = AppConfig::load_or_default(&path).expect("defaults");
    assert_eq!(config.model.model_id, "gpt-4o-2024-08-06");
}

#[test]
fn test_invalid_toml_is_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[agent\nrecursion_limit = ").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, DockhandError::Config(_)));
}

#[test]
fn test_openai_key_reaches_openai_fallbacks_only() {
    std::env::set_var("OPENAI_API_KEY", "sk-from-env");

    let toml_content = r#"
[model]
provider = "openai"

[[fallback_models]]
provider = "openai"
model_id = "gpt-4o-mini"

[[fallback_models]]
provider = "ollama"
model_id = "llama3.2"

[[fallback_models]]
provider = "groq"
model_id = "llama-3.1-70b"
api_key = "gsk-configured"
"#;

    let tmp = write_config_file(toml_content);
    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.api_key.as_deref(), Some("sk-from-env"));
    assert_eq!(config.fallback_models[0].api_key.as_deref(), Some("sk-from-env"));
    assert_eq!(config.fallback_models[1].api_key, None);
    assert_eq!(config.fallback_models[2].api_key.as_deref(), Some("gsk-configured"));

    std::env::remove_var("OPENAI_API_KEY");
}
