use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error};

use dockhand_core::error::{DockhandError, Result};
use dockhand_core::types::*;
use dockhand_tools::ToolRegistry;

use super::node::{Node, NodeContext};
use super::state::MessagesState;

/// Runs the tool calls requested by the last assistant message.
pub struct ToolNode {
    name: String,
    tools: Arc<ToolRegistry>,
    working_dir: PathBuf,
    parallel: bool,
}

struct PendingCall {
    id: String,
    name: String,
    input: serde_json::Value,
    /// Set when the arguments failed validation; the tool is not run.
    rejected: Option<DockhandError>,
}

impl ToolNode {
    pub fn new(tools: Arc<ToolRegistry>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: "tools".to_string(),
            tools,
            working_dir: working_dir.into(),
            parallel: true,
        }
    }

    /// Run calls of one step concurrently (default) or one after another.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Execute one call. Failures are reported back to the model as error results.
    async fn call(&self, call: &PendingCall, ctx: ToolContext) -> ToolResult {
        if let Some(e) = &call.rejected {
            return failure_result(e);
        }
        match self.tools.execute(&call.name, call.input.clone(), ctx).await {
            Ok(result) => result,
            Err(e) => {
                error!(tool = %call.name, error = %e, "Tool failed");
                failure_result(&e)
            }
        }
    }
}

fn failure_result(e: &DockhandError) -> ToolResult {
    ToolResult::error(format!("Error: {}\n Please fix your mistakes.", e))
}

impl Node for ToolNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(
        &'a self,
        state: &'a MessagesState,
        ctx: &'a NodeContext,
    ) -> BoxFuture<'a, Result<Vec<ChatMessage>>> {
        Box::pin(async move {
            let mut calls: Vec<PendingCall> = state
                .last()
                .filter(|m| m.role == Role::Assistant)
                .map(|m| {
                    m.tool_uses()
                        .into_iter()
                        .map(|(id, name, input)| PendingCall {
                            id: id.to_string(),
                            name: name.to_string(),
                            input: input.clone(),
                            rejected: None,
                        })
                        .collect()
                })
                .unwrap_or_default();

            if calls.is_empty() {
                return Err(DockhandError::Graph(
                    "tool node expects an assistant message with tool calls".into(),
                ));
            }

            // Announce every valid call before running any
            for call in &mut calls {
                if let Err(e) = self.tools.validate(&call.name, &call.input) {
                    error!(tool = %call.name, error = %e, "Rejecting tool call");
                    call.rejected = Some(e);
                    continue;
                }
                ctx.event_bus.publish(AgentEvent::ToolStart {
                    name: call.name.clone(),
                    summary: self.tools.summarize(&call.name, &call.input),
                    input: call.input.clone(),
                });
            }

            let tool_ctx = ToolContext {
                thread_id: ctx.thread_id.clone(),
                working_dir: self.working_dir.clone(),
            };

            let results: Vec<ToolResult> = if self.parallel && calls.len() > 1 {
                debug!(count = calls.len(), "Running tool calls concurrently");
                futures::future::join_all(calls.iter().map(|c| self.call(c, tool_ctx.clone())))
                    .await
            } else {
                let mut results = Vec::with_capacity(calls.len());
                for call in &calls {
                    results.push(self.call(call, tool_ctx.clone()).await);
                }
                results
            };

            let mut content = Vec::with_capacity(calls.len());
            for (call, result) in calls.into_iter().zip(results) {
                ctx.event_bus.publish(AgentEvent::ToolEnd {
                    name: call.name,
                    result: result.clone(),
                });
                content.push(ContentBlock::ToolResult {
                    tool_use_id: call.id,
                    content: result.content,
                    is_error: result.is_error,
                });
            }

            Ok(vec![ChatMessage {
                role: Role::Tool,
                content,
                timestamp: Some(chrono::Utc::now()),
            }])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_core::config::ToolsConfig;
    use dockhand_core::event::EventBus;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> NodeContext {
        NodeContext::new(
            ThreadId::from("42"),
            Arc::new(EventBus::default()),
            CancellationToken::new(),
        )
    }

    fn calls(calls: Vec<(&str, serde_json::Value)>) -> MessagesState {
        let content = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, input))| ContentBlock::ToolUse {
                id: format!("call_{i}"),
                name: name.to_string(),
                input,
            })
            .collect();
        MessagesState::new(vec![
            ChatMessage::user("Can you optimize my Dockerfile?"),
            ChatMessage {
                role: Role::Assistant,
                content,
                timestamp: None,
            },
        ])
    }

    fn node() -> ToolNode {
        ToolNode::new(
            Arc::new(ToolRegistry::dockerfile_tools(&ToolsConfig::default())),
            std::env::temp_dir(),
        )
    }

    fn results(message: &ChatMessage) -> Vec<(&str, &str, bool)> {
        message
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some((tool_use_id.as_str(), content.as_str(), *is_error)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_results_keep_call_order() {
        let state = calls(vec![
            ("read_file", serde_json::json!({"file": "go.mod"})),
            ("optimize_dockerfile", serde_json::json!({"dockerfile": "FROM alpine"})),
        ]);
        let update = node().run(&state, &ctx()).await.unwrap();

        assert_eq!(update.len(), 1);
        assert_eq!(update[0].role, Role::Tool);
        assert_eq!(
            results(&update[0]),
            vec![
                ("call_0", "module github.com/docker/ai\n\ngo 1.23.2", false),
                ("call_1", "Here is the optimized Dockerfile. FROM alpine", false),
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_become_error_results() {
        let state = calls(vec![
            ("build_image", serde_json::json!({})),
            ("read_file", serde_json::json!({})),
        ]);
        let update = node().with_parallel(false).run(&state, &ctx()).await.unwrap();

        let results = results(&update[0]);
        assert!(results[0].2);
        assert!(results[0].1.contains("build_image"));
        assert!(results[1].2);
        assert!(results[1].1.ends_with("Please fix your mistakes."));
    }

    #[tokio::test]
    async fn test_publishes_summaries_before_results() {
        let ctx = ctx();
        let mut rx = ctx.event_bus.subscribe();
        let state = calls(vec![
            ("read_dockerfile", serde_json::json!({})),
            ("read_file", serde_json::json!({"file": "go.mod"})),
        ]);
        node().run(&state, &ctx).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                AgentEvent::ToolStart { summary, .. } => seen.push(format!("start {summary}")),
                AgentEvent::ToolEnd { name, .. } => seen.push(format!("end {name}")),
                _ => {}
            }
        }
        assert_eq!(
            seen,
            vec![
                "start read_dockerfile",
                "start read_file go.mod",
                "end read_dockerfile",
                "end read_file",
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_calls_are_not_announced() {
        let ctx = ctx();
        let mut rx = ctx.event_bus.subscribe();
        let state = calls(vec![
            ("read_file", serde_json::json!({})),
            ("read_file", serde_json::json!({"file": "go.mod"})),
        ]);
        let update = node().run(&state, &ctx).await.unwrap();

        let results = results(&update[0]);
        assert!(results[0].2);
        assert!(results[0].1.contains("missing field `file`"));
        assert!(!results[1].2);

        let mut starts = Vec::new();
        let mut ends = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                AgentEvent::ToolStart { summary, .. } => starts.push(summary),
                AgentEvent::ToolEnd { .. } => ends += 1,
                _ => {}
            }
        }
        assert_eq!(starts, vec!["read_file go.mod".to_string()]);
        assert_eq!(ends, 2);
    }

    #[tokio::test]
    async fn test_requires_tool_calls() {
        let state = MessagesState::new(vec![ChatMessage::assistant_text("no tools")]);
        let err = node().run(&state, &ctx()).await.unwrap_err();
        assert!(matches!(err, DockhandError::Graph(_)));
    }
}
