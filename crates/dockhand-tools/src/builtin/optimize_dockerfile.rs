use futures::future::BoxFuture;
use serde::Deserialize;

use dockhand_core::error::Result;
use dockhand_core::traits::Tool;
use dockhand_core::types::{ToolContext, ToolResult};

use super::{char_prefix, parse_input, OPTIMIZED_PREFIX};

/// `optimize_dockerfile(dockerfile)`: hands the model's Dockerfile back unchanged.
pub struct OptimizeDockerfileTool;

#[derive(Deserialize)]
struct OptimizeInput {
    dockerfile: String,
}

impl Tool for OptimizeDockerfileTool {
    fn name(&self) -> &str {
        "optimize_dockerfile"
    }

    fn description(&self) -> &str {
        "Call to optimize a Dockerfile."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "dockerfile": {
                    "type": "string",
                    "description": "Full contents of the Dockerfile to optimize"
                }
            },
            "required": ["dockerfile"]
        })
    }

    fn validate(&self, input: &serde_json::Value) -> Result<()> {
        parse_input::<OptimizeInput>(input).map(|_| ())
    }

    fn summarize(&self, input: &serde_json::Value) -> String {
        let dockerfile = input.get("dockerfile").and_then(|v| v.as_str()).unwrap_or("");
        format!("optimize_dockerfile {}...", char_prefix(dockerfile, 11))
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: OptimizeInput = parse_input(&input)?;

            Ok(ToolResult::success(format!(
                "{} {}",
                OPTIMIZED_PREFIX, params.dockerfile
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_core::types::ThreadId;

    #[test]
    fn test_summary_truncates_to_eleven_chars() {
        let input = serde_json::json!({"dockerfile": "# syntax=docker/dockerfile:1\nFROM alpine"});
        assert_eq!(
            OptimizeDockerfileTool.summarize(&input),
            "optimize_dockerfile # syntax=do..."
        );
    }

    #[tokio::test]
    async fn test_echoes_dockerfile() {
        let ctx = ToolContext {
            thread_id: ThreadId::from("42"),
            working_dir: ".".into(),
        };
        let result = OptimizeDockerfileTool
            .execute(serde_json::json!({"dockerfile": "FROM alpine"}), ctx)
            .await
            .unwrap();
        assert_eq!(result.content, "Here is the optimized Dockerfile. FROM alpine");
    }
}
