use std::sync::Arc;

use futures::future::BoxFuture;
use futures::StreamExt;
use tracing::{debug, warn};

use dockhand_core::config::ModelConfig;
use dockhand_core::error::{DockhandError, Result};
use dockhand_core::traits::LlmClient;
use dockhand_core::types::*;

use super::node::{Node, NodeContext};
use super::state::MessagesState;

/// Highest tool call index accepted beyond the calls seen so far.
const MAX_TOOL_INDEX_GAP: usize = 64;

/// Accumulator for streaming tool call deltas.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

/// Calls the model with the transcript and the bound tools, producing one
/// assistant message per run.
pub struct AgentNode {
    name: String,
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    tools: Vec<ToolDefinition>,
    system_prompt: Option<String>,
}

impl AgentNode {
    pub fn new(llm: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        Self {
            name: "agent".to_string(),
            llm,
            model,
            tools: Vec::new(),
            system_prompt: None,
        }
    }

    /// Bind tools the model may call.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn request_messages(&self, state: &MessagesState) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(state.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.as_str()));
        }
        messages.extend(state.messages.iter().cloned());
        messages
    }
}

impl Node for AgentNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(
        &'a self,
        state: &'a MessagesState,
        ctx: &'a NodeContext,
    ) -> BoxFuture<'a, Result<Vec<ChatMessage>>> {
        Box::pin(async move {
            let messages = self.request_messages(state);
            debug!(
                model = %self.model.model_id,
                messages = messages.len(),
                tools = self.tools.len(),
                "Calling model"
            );

            let mut stream = self
                .llm
                .chat_stream(&self.model, messages, &self.tools)
                .await?;

            let mut text_content = String::new();
            let mut tool_calls: Vec<ToolCallAccumulator> = Vec::new();
            let mut stop_reason = None;

            while let Some(delta) = stream.next().await {
                if ctx.cancel.is_cancelled() {
                    return Err(DockhandError::Cancelled);
                }

                match delta? {
                    StreamDelta::TextDelta(text) => {
                        ctx.event_bus.publish(AgentEvent::TextDelta(text.clone()));
                        text_content.push_str(&text);
                    }
                    StreamDelta::ToolUseStart { index, id, name } => {
                        if index > tool_calls.len() + MAX_TOOL_INDEX_GAP {
                            return Err(DockhandError::LlmParse(format!(
                                "tool call index {} out of range",
                                index
                            )));
                        }
                        while tool_calls.len() <= index {
                            tool_calls.push(ToolCallAccumulator::default());
                        }
                        tool_calls[index].id = id;
                        tool_calls[index].name = name;
                    }
                    StreamDelta::ToolInputDelta { index, delta } => {
                        if let Some(tc) = tool_calls.get_mut(index) {
                            tc.input_json.push_str(&delta);
                        }
                    }
                    StreamDelta::Stop(reason) => {
                        stop_reason = Some(reason);
                    }
                    StreamDelta::Usage {
                        input_tokens,
                        output_tokens,
                    } => {
                        ctx.usage.add(input_tokens, output_tokens);
                    }
                    StreamDelta::MessageId(_) => {}
                }
            }

            let Some(stop_reason) = stop_reason else {
                warn!(model = %self.model.model_id, "Model stream ended without a stop reason");
                return Err(DockhandError::LlmStream("stream ended before stop".into()));
            };
            if stop_reason == StopReason::MaxTokens {
                warn!(model = %self.model.model_id, "Model hit max tokens");
            }

            let mut content = Vec::new();
            if !text_content.is_empty() || tool_calls.is_empty() {
                content.push(ContentBlock::Text { text: text_content });
            }
            for tc in tool_calls.into_iter().filter(|tc| !tc.name.is_empty()) {
                let input = parse_arguments(&tc.name, &tc.input_json);
                content.push(ContentBlock::ToolUse {
                    id: tc.id,
                    name: tc.name,
                    input,
                });
            }

            let message = ChatMessage {
                role: Role::Assistant,
                content,
                timestamp: Some(chrono::Utc::now()),
            };
            debug!(
                tool_calls = message.tool_uses().len(),
                stop_reason = ?stop_reason,
                "Model turn complete"
            );
            Ok(vec![message])
        })
    }
}

/// Parse streamed tool arguments. Blank or malformed JSON becomes `{}`.
fn parse_arguments(tool: &str, raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() => value,
        Ok(_) | Err(_) => {
            warn!(tool, arguments = raw, "Discarding malformed tool arguments");
            serde_json::json!({})
        }
    }
}
