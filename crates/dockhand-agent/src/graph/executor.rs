use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use dockhand_core::error::{DockhandError, Result};
use dockhand_core::event::EventBus;
use dockhand_core::traits::Checkpointer;
use dockhand_core::types::{AgentEvent, ChatMessage, Checkpoint, ThreadId};

use super::edge::{Edge, END, START};
use super::node::{Node, NodeContext};
use super::state::MessagesState;

/// Node executions allowed per invocation unless configured otherwise.
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

/// Per-invocation settings.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub thread_id: ThreadId,
    pub recursion_limit: usize,
    pub max_duration: Option<Duration>,
    pub cancel: CancellationToken,
}

impl RunConfig {
    pub fn new(thread_id: impl Into<ThreadId>) -> Self {
        Self {
            thread_id: thread_id.into(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            max_duration: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Result of one invocation.
#[derive(Debug, Clone)]
pub struct GraphOutput {
    /// Final state, including history loaded from the checkpointer.
    pub state: MessagesState,
    /// Nodes executed during this invocation.
    pub steps: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl GraphOutput {
    /// Text of the last message in the transcript.
    pub fn final_text(&self) -> String {
        self.state.last().map(|m| m.text()).unwrap_or_default()
    }
}

/// A validated graph, ready to run.
///
/// Starting from `START`, the executor runs one node at a time, appends its
/// update to the state, checkpoints, and follows the node's outgoing edge
/// until it reaches `END`.
pub struct CompiledGraph {
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, Edge>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    event_bus: Arc<EventBus>,
}

impl CompiledGraph {
    pub(crate) fn new(
        nodes: HashMap<String, Arc<dyn Node>>,
        edges: HashMap<String, Edge>,
        checkpointer: Option<Arc<dyn Checkpointer>>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            nodes,
            edges,
            checkpointer,
            event_bus,
        }
    }

    /// Publish node, tool and checkpoint events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Registered node names, sorted.
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn checkpointer(&self) -> Option<&Arc<dyn Checkpointer>> {
        self.checkpointer.as_ref()
    }

    /// Latest persisted state of a thread. Empty without a checkpointer.
    pub async fn get_state(&self, thread_id: &ThreadId) -> Result<MessagesState> {
        Ok(self
            .load(thread_id)
            .await?
            .map(|cp| MessagesState::new(cp.messages))
            .unwrap_or_default())
    }

    /// Run the graph on `input` for the thread in `config`.
    pub async fn invoke(&self, input: Vec<ChatMessage>, config: &RunConfig) -> Result<GraphOutput> {
        let start = Instant::now();
        let thread_id = &config.thread_id;

        let (mut state, mut step) = match self.load(thread_id).await? {
            Some(cp) => (MessagesState::new(cp.messages), cp.step),
            None => (MessagesState::default(), 0),
        };
        debug!(thread = %thread_id, history = state.len(), step, "Loaded thread state");

        state.apply(input);
        self.save(thread_id, step, &state).await?;

        let ctx = NodeContext::new(
            thread_id.clone(),
            self.event_bus.clone(),
            config.cancel.clone(),
        );
        let max_secs = config.max_duration.map(|d| d.as_secs()).unwrap_or_default();

        let mut steps = 0usize;
        let mut current = self.next_node(START, &state)?;

        while current != END {
            if config.cancel.is_cancelled() {
                return Err(DockhandError::Cancelled);
            }
            if let Some(max) = config.max_duration {
                if start.elapsed() > max {
                    return Err(DockhandError::MaxDurationExceeded(max_secs));
                }
            }
            if steps >= config.recursion_limit {
                return Err(DockhandError::RecursionLimit(config.recursion_limit));
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| DockhandError::UnknownNode(current.clone()))?;

            steps += 1;
            step += 1;
            debug!(node = %current, step, "Running node");
            self.event_bus.publish(AgentEvent::NodeStarted {
                node: current.clone(),
                step,
            });

            let budget = config.max_duration.map(|d| d.saturating_sub(start.elapsed()));
            let result = tokio::select! {
                result = within_budget(node.run(&state, &ctx), budget, max_secs) => result,
                _ = config.cancel.cancelled() => Err(DockhandError::Cancelled),
            };
            let update = match result {
                Ok(update) => update,
                Err(e) => {
                    error!(node = %current, step, error = %e, "Node failed");
                    return Err(e);
                }
            };

            state.apply(update);
            self.event_bus.publish(AgentEvent::NodeFinished {
                node: current.clone(),
                step,
            });
            self.save(thread_id, step, &state).await?;

            current = self.next_node(&current, &state)?;
        }

        info!(
            thread = %thread_id,
            steps,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Graph run complete"
        );

        Ok(GraphOutput {
            state,
            steps,
            input_tokens: ctx.usage.input_tokens(),
            output_tokens: ctx.usage.output_tokens(),
        })
    }

    fn next_node(&self, from: &str, state: &MessagesState) -> Result<String> {
        let Some(edge) = self.edges.get(from) else {
            debug!(node = from, "No outgoing edge, graph complete");
            return Ok(END.to_string());
        };

        let next = edge.next(state);
        if next != END && !self.nodes.contains_key(&next) {
            return Err(DockhandError::UnknownNode(next));
        }
        Ok(next)
    }

    async fn load(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>> {
        match &self.checkpointer {
            Some(cp) => cp.get(thread_id).await,
            None => Ok(None),
        }
    }

    async fn save(&self, thread_id: &ThreadId, step: usize, state: &MessagesState) -> Result<()> {
        let Some(cp) = &self.checkpointer else {
            return Ok(());
        };

        cp.put(Checkpoint::new(thread_id.clone(), step, state.messages.clone()))
            .await?;
        self.event_bus.publish(AgentEvent::CheckpointSaved {
            thread_id: thread_id.clone(),
            step,
        });
        Ok(())
    }
}

async fn within_budget<F>(fut: F, budget: Option<Duration>, max_secs: u64) -> Result<Vec<ChatMessage>>
where
    F: Future<Output = Result<Vec<ChatMessage>>>,
{
    match budget {
        Some(budget) => tokio::time::timeout(budget, fut)
            .await
            .map_err(|_| DockhandError::MaxDurationExceeded(max_secs))?,
        None => fut.await,
    }
}
