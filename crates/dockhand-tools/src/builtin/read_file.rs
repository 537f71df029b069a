use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use dockhand_core::config::ToolMode;
use dockhand_core::error::{DockhandError, Result};
use dockhand_core::traits::Tool;
use dockhand_core::types::{ToolContext, ToolResult};

use super::{parse_input, resolve_path};

/// Contents returned for any file in placeholder mode.
pub const PLACEHOLDER_FILE: &str = "module github.com/docker/ai\n\ngo 1.23.2";

/// Files larger than this are truncated before going back to the model.
const MAX_FILE_BYTES: usize = 64 * 1024;

pub struct ReadFileTool {
    mode: ToolMode,
}

impl ReadFileTool {
    pub fn new(mode: ToolMode) -> Self {
        Self { mode }
    }
}

#[derive(Deserialize)]
struct ReadFileInput {
    file: String,
}

impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Call to read a file."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file": {
                    "type": "string",
                    "description": "Path of the file to read, relative to the project root"
                }
            },
            "required": ["file"]
        })
    }

    fn validate(&self, input: &serde_json::Value) -> Result<()> {
        parse_input::<ReadFileInput>(input).map(|_| ())
    }

    fn summarize(&self, input: &serde_json::Value) -> String {
        let file = input.get("file").and_then(|v| v.as_str()).unwrap_or("");
        format!("read_file {}", file)
    }

    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: ReadFileInput = parse_input(&input)?;

            if self.mode == ToolMode::Placeholder {
                return Ok(ToolResult::success(PLACEHOLDER_FILE));
            }

            let path = resolve_path(&params.file, &ctx.working_dir)?;
            debug!(path = %path.display(), "Reading file");

            let mut content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                DockhandError::ToolExecution {
                    tool: "read_file".to_string(),
                    message: format!("{}: {}", path.display(), e),
                }
            })?;

            if content.len() > MAX_FILE_BYTES {
                let mut cut = MAX_FILE_BYTES;
                while !content.is_char_boundary(cut) {
                    cut -= 1;
                }
                content.truncate(cut);
                content.push_str("\n... (truncated)");
            }

            Ok(ToolResult::success(content))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_core::types::ThreadId;

    fn ctx(dir: &std::path::Path) -> ToolContext {
        ToolContext {
            thread_id: ThreadId::new(),
            working_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_summary_includes_file() {
        let tool = ReadFileTool::new(ToolMode::Placeholder);
        assert_eq!(
            tool.summarize(&serde_json::json!({"file": "go.mod"})),
            "read_file go.mod"
        );
    }

    #[tokio::test]
    async fn test_placeholder_ignores_path() {
        let tool = ReadFileTool::new(ToolMode::Placeholder);
        let result = tool
            .execute(serde_json::json!({"file": "server/pyproject.toml"}), ctx(std::path::Path::new("/")))
            .await
            .unwrap();
        assert_eq!(result.content, "module github.com/docker/ai\n\ngo 1.23.2");
    }

    #[tokio::test]
    async fn test_missing_argument_is_validation_error() {
        let tool = ReadFileTool::new(ToolMode::Placeholder);
        let err = tool
            .execute(serde_json::json!({}), ctx(std::path::Path::new("/")))
            .await
            .unwrap_err();
        assert!(matches!(err, DockhandError::ToolValidation(_)));
    }

    #[tokio::test]
    async fn test_workspace_reads_relative_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/x\n").unwrap();

        let tool = ReadFileTool::new(ToolMode::Workspace);
        let result = tool
            .execute(serde_json::json!({"file": "go.mod"}), ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(result.content, "module example.com/x\n");
    }

    #[tokio::test]
    async fn test_workspace_refuses_files_outside_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(ToolMode::Workspace);

        for file in ["/etc/hostname", "../../../../../../etc/passwd"] {
            let err = tool
                .execute(serde_json::json!({"file": file}), ctx(dir.path()))
                .await
                .unwrap_err();
            assert!(matches!(err, DockhandError::ToolValidation(_)), "{} was read", file);
        }
    }

    #[tokio::test]
    async fn test_workspace_truncates_large_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "a".repeat(MAX_FILE_BYTES + 10)).unwrap();

        let tool = ReadFileTool::new(ToolMode::Workspace);
        let result = tool
            .execute(serde_json::json!({"file": "big.txt"}), ctx(dir.path()))
            .await
            .unwrap();
        assert!(result.content.ends_with("... (truncated)"));
        assert!(result.content.len() < MAX_FILE_BYTES + 20);
    }
}
