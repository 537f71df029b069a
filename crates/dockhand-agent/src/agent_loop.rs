use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use dockhand_core::config::AppConfig;
use dockhand_core::error::Result;
use dockhand_core::event::EventBus;
use dockhand_core::traits::{Checkpointer, LlmClient};
use dockhand_core::types::*;
use dockhand_tools::ToolRegistry;

use crate::graph::{
    tools_condition, AgentNode, CompiledGraph, GraphOutput, RunConfig, StateGraph, ToolNode,
    END, START,
};

/// The agent runtime: a two-node graph where the model calls tools until it
/// answers without any.
pub struct AgentRuntime {
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
}

impl AgentRuntime {
    pub fn new(
        config: AppConfig,
        llm: impl Into<Arc<dyn LlmClient>>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            llm: llm.into(),
            tools,
            checkpointer: None,
            event_bus,
            cancel: CancellationToken::new(),
        }
    }

    /// Persist threads with `checkpointer`.
    pub fn with_checkpointer(mut self, checkpointer: Option<Arc<dyn Checkpointer>>) -> Self {
        self.checkpointer = checkpointer;
        self
    }

    /// Get a cancellation token for this runtime.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Wire the agent graph:
    ///
    /// `START -> agent`, `agent -> tools | END` by [`tools_condition`],
    /// `tools -> agent`.
    pub fn build_graph(&self) -> Result<CompiledGraph> {
        let agent = AgentNode::new(self.llm.clone(), self.config.model.clone())
            .with_tools(self.tools.definitions())
            .with_system_prompt(self.config.agent.system_prompt.clone());
        let tools = ToolNode::new(self.tools.clone(), self.config.working_dir())
            .with_parallel(self.config.agent.parallel_tools);

        let mut graph = StateGraph::new();
        graph
            .add_node(agent)
            .add_node(tools)
            .add_edge(START, "agent")
            .add_conditional_edges("agent", tools_condition, &["tools", END])
            .add_edge("tools", "agent");

        Ok(graph
            .compile(self.checkpointer.clone())?
            .with_event_bus(self.event_bus.clone()))
    }

    fn run_config(&self, thread_id: &ThreadId) -> RunConfig {
        let mut run = RunConfig::new(thread_id.clone())
            .with_recursion_limit(self.config.agent.recursion_limit)
            .with_cancel(self.cancel.clone());
        // 0 means no wall-clock limit
        if self.config.agent.max_duration_secs > 0 {
            run = run.with_max_duration(Duration::from_secs(self.config.agent.max_duration_secs));
        }
        run
    }

    /// Run one invocation on `thread_id` with `input` appended to its transcript.
    pub async fn invoke(&self, thread_id: &ThreadId, input: Vec<ChatMessage>) -> Result<GraphOutput> {
        self.event_bus.publish(AgentEvent::RunStarted {
            thread_id: thread_id.clone(),
        });

        let result = match self.build_graph() {
            Ok(graph) => graph.invoke(input, &self.run_config(thread_id)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => {
                info!(
                    thread = %thread_id,
                    steps = output.steps,
                    input_tokens = output.input_tokens,
                    output_tokens = output.output_tokens,
                    "Agent run complete"
                );
                self.event_bus.publish(AgentEvent::RunComplete {
                    thread_id: thread_id.clone(),
                    steps: output.steps,
                    input_tokens: output.input_tokens,
                    output_tokens: output.output_tokens,
                });
                Ok(output)
            }
            Err(e) => {
                error!(thread = %thread_id, error = %e, "Agent run failed");
                self.event_bus.publish(AgentEvent::RunError {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Send `user_message` on `thread_id` and return the final response text.
    pub async fn run(&self, thread_id: &ThreadId, user_message: &str) -> Result<String> {
        let output = self
            .invoke(thread_id, vec![ChatMessage::user(user_message)])
            .await?;
        Ok(output.final_text())
    }

    /// Checkpointed transcript of a thread. Empty without a checkpointer.
    pub async fn history(&self, thread_id: &ThreadId) -> Result<Vec<ChatMessage>> {
        match &self.checkpointer {
            Some(cp) => Ok(cp
                .get(thread_id)
                .await?
                .map(|c| c.messages)
                .unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }
}
