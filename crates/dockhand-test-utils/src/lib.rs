//! Test helpers shared across the Dockhand crates.
//!
//! The centrepiece is [`MockLlmClient`], which replays a script of model
//! turns and records every request it receives, so agent runs can be tested
//! without a network.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use dockhand_core::config::{AppConfig, ModelConfig};
use dockhand_core::error::{DockhandError, Result};
use dockhand_core::traits::LlmClient;
use dockhand_core::types::{ChatMessage, StopReason, StreamDelta, ToolDefinition};

/// One scripted model response, expressed as the deltas a provider would stream.
#[derive(Debug, Clone)]
pub struct MockTurn {
    deltas: Vec<StreamDelta>,
}

impl MockTurn {
    /// A plain answer that ends the turn.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        // Split in two so consumers must accumulate
        let (head, tail) = split_half(&text);
        let mut deltas = Vec::new();
        for part in [head, tail] {
            if !part.is_empty() {
                deltas.push(StreamDelta::TextDelta(part.to_string()));
            }
        }
        deltas.push(StreamDelta::Stop(StopReason::EndTurn));
        deltas.push(StreamDelta::Usage {
            input_tokens: 10,
            output_tokens: 5,
        });
        Self { deltas }
    }

    /// A response calling each `(name, arguments)` pair, in order.
    pub fn tool_calls(calls: Vec<(&str, serde_json::Value)>) -> Self {
        let mut deltas = Vec::new();
        for (index, (name, args)) in calls.into_iter().enumerate() {
            deltas.push(StreamDelta::ToolUseStart {
                index,
                id: format!("call_{}_{}", name, index),
                name: name.to_string(),
            });
            let json = args.to_string();
            let (head, tail) = split_half(&json);
            deltas.push(StreamDelta::ToolInputDelta {
                index,
                delta: head.to_string(),
            });
            deltas.push(StreamDelta::ToolInputDelta {
                index,
                delta: tail.to_string(),
            });
        }
        deltas.push(StreamDelta::Stop(StopReason::ToolUse));
        deltas.push(StreamDelta::Usage {
            input_tokens: 20,
            output_tokens: 8,
        });
        Self { deltas }
    }

    /// Raw deltas, for malformed-stream cases.
    pub fn raw(deltas: Vec<StreamDelta>) -> Self {
        Self { deltas }
    }
}

fn split_half(s: &str) -> (&str, &str) {
    let mid = s
        .char_indices()
        .nth(s.chars().count() / 2)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.split_at(mid)
}

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model_id: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
}

/// Scripted [`LlmClient`]. Each call pops the next [`MockTurn`]; an exhausted
/// script fails the request.
#[derive(Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<MockTurn>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlmClient {
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            script: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Turns not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl LlmClient for MockLlmClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let request = RecordedRequest {
            model_id: config.model_id.clone(),
            temperature: config.temperature,
            messages,
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        };

        Box::pin(async move {
            self.requests
                .lock()
                .map_err(|e| DockhandError::LlmRequest(e.to_string()))?
                .push(request);

            let turn = self
                .script
                .lock()
                .map_err(|e| DockhandError::LlmRequest(e.to_string()))?
                .pop_front()
                .ok_or_else(|| DockhandError::LlmRequest("mock script exhausted".into()))?;

            let items: Vec<Result<StreamDelta>> = turn.deltas.into_iter().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(items)) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}

/// Parse an [`AppConfig`] from TOML text.
pub fn config_from_toml(text: &str) -> AppConfig {
    toml::from_str(text).expect("valid test config")
}

/// Default config whose tools work inside `dir`.
pub fn test_config(dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.agent.working_dir = dir.display().to_string();
    config
}

/// Write TOML to a temp file that lives as long as the handle.
pub fn write_config_file(text: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(text.as_bytes()).expect("write toml");
    tmp
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_mock_replays_script_and_records() {
        let mock = MockLlmClient::new(vec![MockTurn::text("hello there")]);
        let config = ModelConfig::default();

        let stream = mock
            .chat_stream(&config, vec![ChatMessage::user("hi")], &[])
            .await
            .unwrap();
        let text: String = stream
            .filter_map(|d| async move {
                match d {
                    Ok(StreamDelta::TextDelta(t)) => Some(t),
                    _ => None,
                }
            })
            .collect()
            .await;
        assert_eq!(text, "hello there");
        assert_eq!(mock.remaining(), 0);
        assert_eq!(mock.requests()[0].model_id, "gpt-4o-2024-08-06");

        let err = mock.chat_stream(&config, vec![], &[]).await.err().unwrap();
        assert!(matches!(err, DockhandError::LlmRequest(_)));
    }

    #[test]
    fn test_tool_call_arguments_reassemble() {
        let turn = MockTurn::tool_calls(vec![("read_file", serde_json::json!({"file": "go.mod"}))]);
        let args: String = turn
            .deltas
            .iter()
            .filter_map(|d| match d {
                StreamDelta::ToolInputDelta { delta, .. } => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        let parsed: serde_json::Value = serde_json::from_str(&args).unwrap();
        assert_eq!(parsed["file"], "go.mod");
    }
}
