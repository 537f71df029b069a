use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tracing::warn;

use dockhand_core::error::{DockhandError, Result};

/// Incremental parser turning raw SSE text into events.
/// Events are separated by a blank line; only `event:` and `data:` fields matter here.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
}

/// A parsed SSE event.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed text into the parser and drain every complete event.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(&chunk.replace("\r\n", "\n"));
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&block) {
                events.push(event);
            }
        }

        events
    }

    /// Parse whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_block(&rest)
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if let Some(val) = line.strip_prefix("event:") {
            event_type = Some(val.trim_start().to_string());
        } else if let Some(val) = line.strip_prefix("data:") {
            data_lines.push(val.strip_prefix(' ').unwrap_or(val));
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event_type,
        data: data_lines.join("\n"),
    })
}

/// A stream of SSE events over a response body.
/// A transport failure is yielded once as `LlmStream` and ends the stream.
pub struct SseStream<S> {
    inner: S,
    parser: SseParser,
    pending: VecDeque<Result<SseEvent>>,
    /// Bytes of a UTF-8 sequence split across chunks.
    partial: Vec<u8>,
    done: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            partial: Vec::new(),
            done: false,
        }
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.partial.extend_from_slice(&bytes);
                    let valid_up_to = match std::str::from_utf8(&this.partial) {
                        Ok(_) => this.partial.len(),
                        Err(e) => e.valid_up_to(),
                    };
                    let complete: Vec<u8> = this.partial.drain(..valid_up_to).collect();
                    let text = String::from_utf8_lossy(&complete);
                    this.pending.extend(this.parser.feed(&text).into_iter().map(Ok));
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!(error = %e, "SSE byte stream failed");
                    this.done = true;
                    this.pending
                        .push_back(Err(DockhandError::LlmStream(e.to_string())));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    this.pending.extend(this.parser.finish().map(Ok));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
