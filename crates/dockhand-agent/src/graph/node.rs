use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use dockhand_core::error::Result;
use dockhand_core::event::EventBus;
use dockhand_core::types::{ChatMessage, ThreadId};

use super::state::MessagesState;

/// A step in the agent graph.
///
/// A node reads the current state and returns the messages to append to it.
pub trait Node: Send + Sync + 'static {
    /// Name the node is registered under.
    fn name(&self) -> &str;

    fn run<'a>(
        &'a self,
        state: &'a MessagesState,
        ctx: &'a NodeContext,
    ) -> BoxFuture<'a, Result<Vec<ChatMessage>>>;
}

/// Per-invocation context handed to every node.
#[derive(Clone)]
pub struct NodeContext {
    pub thread_id: ThreadId,
    pub event_bus: Arc<EventBus>,
    pub cancel: CancellationToken,
    pub usage: Arc<TokenUsage>,
}

impl NodeContext {
    pub fn new(thread_id: ThreadId, event_bus: Arc<EventBus>, cancel: CancellationToken) -> Self {
        Self {
            thread_id,
            event_bus,
            cancel,
            usage: Arc::new(TokenUsage::default()),
        }
    }
}

/// Token counters accumulated across one invocation.
#[derive(Debug, Default)]
pub struct TokenUsage {
    input: AtomicU64,
    output: AtomicU64,
}

impl TokenUsage {
    pub fn add(&self, input_tokens: u64, output_tokens: u64) {
        self.input.fetch_add(input_tokens, Ordering::Relaxed);
        self.output.fetch_add(output_tokens, Ordering::Relaxed);
    }

    pub fn input_tokens(&self) -> u64 {
        self.input.load(Ordering::Relaxed)
    }

    pub fn output_tokens(&self) -> u64 {
        self.output.load(Ordering::Relaxed)
    }
}
