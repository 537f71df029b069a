pub mod agent_loop;
pub mod checkpoint;
pub mod graph;

pub use agent_loop::AgentRuntime;
pub use checkpoint::{open_checkpointer, MemorySaver, SqliteSaver};
pub use graph::{
    tools_condition, AgentNode, CompiledGraph, GraphOutput, MessagesState, Node, NodeContext,
    RunConfig, StateGraph, ToolNode, END, START,
};
