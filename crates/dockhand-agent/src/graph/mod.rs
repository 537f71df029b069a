//! Agent graph: named nodes over a shared message transcript, joined by
//! direct and routed edges.
//!
//! ```text
//! START -> agent -?-> tools -> agent
//!              \--> END
//! ```

pub mod agent_node;
pub mod builder;
pub mod edge;
pub mod executor;
pub mod node;
pub mod state;
pub mod tool_node;

pub use agent_node::AgentNode;
pub use builder::StateGraph;
pub use edge::{tools_condition, Edge, EdgeCondition, Router, END, START};
pub use executor::{CompiledGraph, GraphOutput, RunConfig, DEFAULT_RECURSION_LIMIT};
pub use node::{Node, NodeContext, TokenUsage};
pub use state::MessagesState;
pub use tool_node::ToolNode;
