use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, info};

use dockhand_core::config::ToolMode;
use dockhand_core::error::{DockhandError, Result};
use dockhand_core::traits::Tool;
use dockhand_core::types::{ToolContext, ToolResult};

use super::{parse_input, resolve_path, OPTIMIZED_PREFIX};

pub struct WriteDockerfileTool {
    mode: ToolMode,
    dockerfile: String,
}

impl WriteDockerfileTool {
    pub fn new(mode: ToolMode, dockerfile: impl Into<String>) -> Self {
        Self {
            mode,
            dockerfile: dockerfile.into(),
        }
    }
}

#[derive(Deserialize)]
struct WriteInput {
    dockerfile: String,
}

impl Tool for WriteDockerfileTool {
    fn name(&self) -> &str {
        "write_dockerfile"
    }

    fn description(&self) -> &str {
        "Write a Dockerfile."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "dockerfile": {
                    "type": "string",
                    "description": "Full contents of the Dockerfile to write"
                }
            },
            "required": ["dockerfile"]
        })
    }

    fn validate(&self, input: &serde_json::Value) -> Result<()> {
        parse_input::<WriteInput>(input).map(|_| ())
    }

    fn summarize(&self, input: &serde_json::Value) -> String {
        let dockerfile = input.get("dockerfile").and_then(|v| v.as_str()).unwrap_or("");
        format!("write_dockerfile {}...", dockerfile)
    }

    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: WriteInput = parse_input(&input)?;

            if self.mode == ToolMode::Placeholder {
                return Ok(ToolResult::success(format!(
                    "{} {}",
                    OPTIMIZED_PREFIX, params.dockerfile
                )));
            }

            let path = resolve_path(&self.dockerfile, &ctx.working_dir)?;
            debug!(path = %path.display(), "Writing Dockerfile");

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DockhandError::ToolExecution {
                        tool: "write_dockerfile".to_string(),
                        message: format!("Failed to create directories: {}", e),
                    })?;
            }

            let mut body = params.dockerfile;
            if !body.ends_with('\n') {
                body.push('\n');
            }
            tokio::fs::write(&path, &body)
                .await
                .map_err(|e| DockhandError::ToolExecution {
                    tool: "write_dockerfile".to_string(),
                    message: format!("{}: {}", path.display(), e),
                })?;

            info!(path = %path.display(), bytes = body.len(), thread = %ctx.thread_id, "Dockerfile written");
            Ok(ToolResult::success(format!(
                "Dockerfile written to {}",
                path.display()
            )))
        })
    }
}
