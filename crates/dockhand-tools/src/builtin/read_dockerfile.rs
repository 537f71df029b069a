use futures::future::BoxFuture;
use tracing::debug;

use dockhand_core::config::ToolMode;
use dockhand_core::error::{DockhandError, Result};
use dockhand_core::traits::Tool;
use dockhand_core::types::{ToolContext, ToolResult};

use super::resolve_path;

/// Dockerfile handed out in placeholder mode.
pub const PLACEHOLDER_DOCKERFILE: &str = r##"# syntax=docker/dockerfile:1

FROM python:3.12-alpine3.20@sha256:38e179a0f0436c97ecc76bcd378d7293ab3ee79e4b8c440fdc7113670cb6e204 AS base
RUN pip --no-cache-dir install poetry==1.8.3

ENV POETRY_NO_INTERACTION=1 \
    POETRY_VIRTUALENVS_IN_PROJECT=1 \
    POETRY_VIRTUALENVS_CREATE=1 \
    POETRY_CACHE_DIR=/tmp/poetry_cache

# Install dependencies
WORKDIR /app
COPY llm/pyproject.toml llm/poetry.lock ./llm/
COPY recipes/pyproject.toml recipes/poetry.lock ./recipes/
COPY server/pyproject.toml server/poetry.lock ./server/
RUN mkdir -p ./llm/src/llm ./recipes/src/recipes
RUN --mount=type=cache,target=$POETRY_CACHE_DIR poetry -C /app/server install --no-root

# Copy the sources
COPY . ./

# Check the some well knwon files are properly copied
RUN test -f ./data/run_image/data.json

# Get the git commit and use it as the version
ARG GIT_COMMIT="HEAD"
RUN sed -i "s/HEAD/$GIT_COMMIT/" server/server/settings.py

FROM base AS test
RUN --mount=type=cache,target=$POETRY_CACHE_DIR \
    poetry -C /app/tests install --no-root

RUN --mount=type=secret,id=openai,env=OPENAI_API_KEY \
    poetry -C /app/tests run pytest -n 4 --junitxml=/out/test-results.xml || true

FROM scratch AS test-results
COPY --from=test /out/test-results.xml /test-results.xml

FROM base AS final
EXPOSE 8000
ENTRYPOINT ["/app/scripts/entrypoint.sh"]
"##;

pub const DOCKERFILE_START: &str = "[DOCKERFILE_START]";
pub const DOCKERFILE_END: &str = "[DOCKERFILE_END]";

/// Wrap a Dockerfile in the markers the model is told to look for.
pub fn frame_dockerfile(dockerfile: &str) -> String {
    format!(
        "Read any files that are needed to optimize this Dockerfile:\n\n{}\n{}\n{}",
        DOCKERFILE_START,
        dockerfile.trim_end(),
        DOCKERFILE_END
    )
}

/// `read_dockerfile()`: returns the project's Dockerfile.
pub struct ReadDockerfileTool {
    mode: ToolMode,
    dockerfile: String,
}

impl ReadDockerfileTool {
    pub fn new(mode: ToolMode, dockerfile: impl Into<String>) -> Self {
        Self {
            mode,
            dockerfile: dockerfile.into(),
        }
    }
}

impl Tool for ReadDockerfileTool {
    fn name(&self) -> &str {
        "read_dockerfile"
    }

    fn description(&self) -> &str {
        "Call to read a Dockerfile."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    fn execute(
        &self,
        _input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let dockerfile = match self.mode {
                ToolMode::Placeholder => PLACEHOLDER_DOCKERFILE.to_string(),
                ToolMode::Workspace => {
                    let path = resolve_path(&self.dockerfile, &ctx.working_dir)?;
                    debug!(path = %path.display(), "Reading Dockerfile");
                    tokio::fs::read_to_string(&path).await.map_err(|e| {
                        DockhandError::ToolExecution {
                            tool: self.name().to_string(),
                            message: format!("{}: {}", path.display(), e),
                        }
                    })?
                }
            };

            Ok(ToolResult::success(frame_dockerfile(&dockerfile)))
        })
    }
}
