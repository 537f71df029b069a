use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// LLM client: streaming chat with tool calling.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Tool: a named function the model may call.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in LLM tool calls).
    fn name(&self) -> &str;

    /// Human-readable description, sent to the model.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input and context.
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>>;

    /// Check the arguments without running the tool.
    fn validate(&self, input: &serde_json::Value) -> Result<()> {
        let _ = input;
        Ok(())
    }

    /// Timeout in seconds for this tool.
    fn timeout_secs(&self) -> u64 {
        30
    }

    /// One-line console echo of an invocation.
    fn summarize(&self, input: &serde_json::Value) -> String {
        let _ = input;
        self.name().to_string()
    }
}

/// Checkpointer: per-thread transcript persistence between graph invocations.
pub trait Checkpointer: Send + Sync + 'static {
    /// Latest checkpoint for a thread, if any.
    fn get(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Option<Checkpoint>>>;

    /// Store a new checkpoint. It becomes the thread's latest.
    fn put(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<()>>;

    /// All checkpoints for a thread, oldest first.
    fn list(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Vec<Checkpoint>>>;

    /// Drop every checkpoint of a thread. Returns how many were removed.
    fn delete(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<usize>>;
}
