use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tracing::debug;

use dockhand_core::types::AgentEvent;
use dockhand_tools::builtin::char_prefix;

/// Longest tool error echoed to the console, in characters.
const MAX_ERROR_CHARS: usize = 200;

/// A line the CLI prints while a run is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Echo {
    /// A tool invocation summary, printed to stdout.
    Tool(String),
    /// A failed tool, printed to stderr.
    ToolError(String),
    /// Run totals, printed to stderr.
    Done(String),
}

/// The console line for an event, if it has one.
pub fn render(event: &AgentEvent) -> Option<Echo> {
    match event {
        AgentEvent::ToolStart { summary, .. } => Some(Echo::Tool(summary.clone())),
        AgentEvent::ToolEnd { name, result } if result.is_error => Some(Echo::ToolError(format!(
            "[{}: ERROR] {}",
            name,
            char_prefix(&result.content, MAX_ERROR_CHARS)
        ))),
        AgentEvent::RunComplete {
            steps,
            input_tokens,
            output_tokens,
            ..
        } => Some(Echo::Done(format!(
            "[done: {} steps, {}in/{}out tokens]",
            steps, input_tokens, output_tokens
        ))),
        _ => None,
    }
}

/// Echo events until the run finishes or the bus closes.
///
/// Falling behind the bus drops the oldest events but keeps echoing.
pub async fn echo_events(mut rx: Receiver<AgentEvent>, mut emit: impl FnMut(Echo)) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Some(echo) = render(&event) {
                    emit(echo);
                }
                if matches!(event, AgentEvent::RunComplete { .. } | AgentEvent::RunError { .. }) {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Console fell behind, skipped events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
