use std::fmt;
use std::sync::Arc;

use super::state::MessagesState;

/// Virtual entry node.
pub const START: &str = "__start__";
/// Virtual exit node.
pub const END: &str = "__end__";

/// Picks the next node from the current state.
pub type Router = Arc<dyn Fn(&MessagesState) -> String + Send + Sync>;

/// How a node hands off once it finishes.
#[derive(Clone)]
pub enum EdgeCondition {
    /// Always go to `to`.
    Always { to: String },
    /// Ask the router. `targets` lists the nodes it may return, when known.
    Routed {
        router: Router,
        targets: Option<Vec<String>>,
    },
}

impl fmt::Debug for EdgeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always { to } => f.debug_struct("Always").field("to", to).finish(),
            Self::Routed { targets, .. } => f
                .debug_struct("Routed")
                .field("targets", targets)
                .finish_non_exhaustive(),
        }
    }
}

/// An outgoing edge of a node.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub condition: EdgeCondition,
}

impl Edge {
    /// Create an unconditional edge.
    pub fn always(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            condition: EdgeCondition::Always { to: to.into() },
        }
    }

    /// Create an edge resolved by `router` at run time.
    pub fn routed<F>(from: impl Into<String>, router: F, targets: Option<Vec<String>>) -> Self
    where
        F: Fn(&MessagesState) -> String + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            condition: EdgeCondition::Routed {
                router: Arc::new(router),
                targets,
            },
        }
    }

    /// Resolve the destination for the given state.
    pub fn next(&self, state: &MessagesState) -> String {
        match &self.condition {
            EdgeCondition::Always { to } => to.clone(),
            EdgeCondition::Routed { router, .. } => router(state),
        }
    }

    /// Destinations this edge can lead to, if statically known.
    pub fn targets(&self) -> Option<Vec<String>> {
        match &self.condition {
            EdgeCondition::Always { to } => Some(vec![to.clone()]),
            EdgeCondition::Routed { targets, .. } => targets.clone(),
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self.condition, EdgeCondition::Routed { .. })
    }
}

/// Route to `tools` when the last message asks for tool calls, otherwise finish.
pub fn tools_condition(state: &MessagesState) -> String {
    match state.last() {
        Some(msg) if msg.has_tool_calls() => "tools".to_string(),
        _ => END.to_string(),
    }
}
