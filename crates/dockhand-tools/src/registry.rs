use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use dockhand_core::config::ToolsConfig;
use dockhand_core::error::{DockhandError, Result};
use dockhand_core::traits::Tool;
use dockhand_core::types::{ToolContext, ToolDefinition, ToolResult};

use crate::builtin::{
    OptimizeDockerfileTool, ReadDockerfileTool, ReadFileTool, WriteDockerfileTool,
};

/// Registry of available tools, keyed by name.
///
/// Ordered so tool definitions go to the model in a stable order.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Names of all registered tools, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool definitions for sending to the LLM.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Console summary for a call; falls back to the bare name for unknown tools.
    pub fn summarize(&self, name: &str, input: &serde_json::Value) -> String {
        self.get(name)
            .map(|t| t.summarize(input))
            .unwrap_or_else(|| name.to_string())
    }

    /// Check a call's arguments before it is announced or run.
    pub fn validate(&self, name: &str, input: &serde_json::Value) -> Result<()> {
        self.get(name)
            .ok_or_else(|| DockhandError::ToolNotFound(name.to_string()))?
            .validate(input)
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| DockhandError::ToolNotFound(name.to_string()))?;

        debug!(tool = name, thread = %ctx.thread_id, "Executing tool");
        let timeout = std::time::Duration::from_secs(tool.timeout_secs());

        match tokio::time::timeout(timeout, tool.execute(input, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(DockhandError::ToolTimeout {
                tool: name.to_string(),
                timeout_secs: tool.timeout_secs(),
            }),
        }
    }

    /// Create a registry with the four Dockerfile tools.
    pub fn dockerfile_tools(config: &ToolsConfig) -> Self {
        let mut registry = Self::new();
        registry.register(ReadDockerfileTool::new(config.mode, &config.dockerfile));
        registry.register(ReadFileTool::new(config.mode));
        registry.register(OptimizeDockerfileTool);
        registry.register(WriteDockerfileTool::new(config.mode, &config.dockerfile));
        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_core::types::ThreadId;
    use futures::future::BoxFuture;

    fn ctx() -> ToolContext {
        ToolContext {
            thread_id: ThreadId::from("42"),
            working_dir: std::env::temp_dir(),
        }
    }

    struct SlowTool;

    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Never finishes in time."
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        fn timeout_secs(&self) -> u64 {
            1
        }
        fn execute(
            &self,
            _input: serde_json::Value,
            _ctx: ToolContext,
        ) -> BoxFuture<'_, Result<ToolResult>> {
            Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(ToolResult::success("late"))
            })
        }
    }

    #[test]
    fn test_dockerfile_tools_registered_in_order() {
        let registry = ToolRegistry::dockerfile_tools(&ToolsConfig::default());
        assert_eq!(
            registry.list(),
            vec!["optimize_dockerfile", "read_dockerfile", "read_file", "write_dockerfile"]
        );

        let defs = registry.definitions();
        assert_eq!(defs.len(), 4);
        let read_file = defs.iter().find(|d| d.name == "read_file").unwrap();
        assert_eq!(read_file.description, "Call to read a file.");
        assert_eq!(read_file.input_schema["required"][0], "file");
    }

    #[test]
    fn test_summarize_unknown_tool() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.summarize("nope", &serde_json::json!({})), "nope");
    }

    #[test]
    fn test_validate_checks_arguments() {
        let registry = ToolRegistry::dockerfile_tools(&ToolsConfig::default());
        assert!(registry.validate("read_file", &serde_json::json!({"file": "go.mod"})).is_ok());
        assert!(registry.validate("read_dockerfile", &serde_json::json!({})).is_ok());
        assert!(matches!(
            registry.validate("read_file", &serde_json::json!({})),
            Err(DockhandError::ToolValidation(_))
        ));
        assert!(matches!(
            registry.validate("write_dockerfile", &serde_json::json!({"dockerfile": 3})),
            Err(DockhandError::ToolValidation(_))
        ));
        assert!(matches!(
            registry.validate("build_image", &serde_json::json!({})),
            Err(DockhandError::ToolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = ToolRegistry::dockerfile_tools(&ToolsConfig::default());
        let err = registry
            .execute("build_image", serde_json::json!({}), ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, DockhandError::ToolNotFound(name) if name == "build_image"));
    }

    #[tokio::test]
    async fn test_execute_routes_by_name() {
        let registry = ToolRegistry::dockerfile_tools(&ToolsConfig::default());
        let result = registry
            .execute("read_file", serde_json::json!({"file": "go.mod"}), ctx())
            .await
            .unwrap();
        assert_eq!(result.content, "module github.com/docker/ai\n\ngo 1.23.2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let err = registry
            .execute("slow", serde_json::json!({}), ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, DockhandError::ToolTimeout { timeout_secs: 1, .. }));
    }
}
