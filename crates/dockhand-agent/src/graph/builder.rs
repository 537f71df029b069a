use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dockhand_core::error::{DockhandError, Result};
use dockhand_core::event::EventBus;
use dockhand_core::traits::Checkpointer;

use super::edge::{Edge, END, START};
use super::executor::CompiledGraph;
use super::node::Node;
use super::state::MessagesState;

/// Builder for an agent graph over [`MessagesState`].
///
/// Nodes and edges are collected first and checked together in
/// [`StateGraph::compile`].
#[derive(Default)]
pub struct StateGraph {
    nodes: Vec<Arc<dyn Node>>,
    edges: Vec<Edge>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node under its own name.
    pub fn add_node(&mut self, node: impl Node) -> &mut Self {
        self.nodes.push(Arc::new(node));
        self
    }

    /// Add an unconditional edge.
    pub fn add_edge(&mut self, from: &str, to: &str) -> &mut Self {
        self.edges.push(Edge::always(from, to));
        self
    }

    /// Add a routed edge. `targets` lists the nodes the router may pick; pass
    /// an empty slice when they are only known at run time.
    pub fn add_conditional_edges<F>(&mut self, from: &str, router: F, targets: &[&str]) -> &mut Self
    where
        F: Fn(&MessagesState) -> String + Send + Sync + 'static,
    {
        let targets = if targets.is_empty() {
            None
        } else {
            Some(targets.iter().map(|t| t.to_string()).collect())
        };
        self.edges.push(Edge::routed(from, router, targets));
        self
    }

    /// Validate and freeze the graph.
    pub fn compile(self, checkpointer: Option<Arc<dyn Checkpointer>>) -> Result<CompiledGraph> {
        if self.nodes.is_empty() {
            return Err(DockhandError::Graph("graph has no nodes".into()));
        }

        let mut nodes: HashMap<String, Arc<dyn Node>> = HashMap::new();
        for node in self.nodes {
            let name = node.name().to_string();
            if name.is_empty() || name == START || name == END {
                return Err(DockhandError::Graph(format!("reserved node name '{}'", name)));
            }
            if nodes.insert(name.clone(), node).is_some() {
                return Err(DockhandError::Graph(format!("duplicate node '{}'", name)));
            }
        }

        let known = |name: &str| name == END || nodes.contains_key(name);
        let mut outgoing: HashMap<String, Edge> = HashMap::new();
        let mut sources = HashSet::new();

        for edge in self.edges {
            if edge.from == END {
                return Err(DockhandError::Graph("END cannot have outgoing edges".into()));
            }
            if edge.from != START && !nodes.contains_key(&edge.from) {
                return Err(DockhandError::Graph(format!(
                    "edge from unknown node '{}'",
                    edge.from
                )));
            }
            for target in edge.targets().unwrap_or_default() {
                if target == START {
                    return Err(DockhandError::Graph("START cannot be an edge target".into()));
                }
                if !known(&target) {
                    return Err(DockhandError::Graph(format!(
                        "edge from '{}' to unknown node '{}'",
                        edge.from, target
                    )));
                }
            }
            if !sources.insert(edge.from.clone()) {
                let kind = match (edge.is_conditional(), outgoing[&edge.from].is_conditional()) {
                    (true, true) => "more than one conditional",
                    (false, false) => "more than one direct",
                    _ => "both direct and conditional",
                };
                return Err(DockhandError::Graph(format!(
                    "node '{}' has {} outgoing edges",
                    edge.from, kind
                )));
            }
            outgoing.insert(edge.from.clone(), edge);
        }

        if !outgoing.contains_key(START) {
            return Err(DockhandError::Graph("graph has no edge from START".into()));
        }

        Ok(CompiledGraph::new(
            nodes,
            outgoing,
            checkpointer,
            Arc::new(EventBus::default()),
        ))
    }
}
