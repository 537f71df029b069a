use serde::{Deserialize, Serialize};

use dockhand_core::types::ChatMessage;

/// Graph state: the conversation transcript.
///
/// Node updates are merged with an append reducer, so every node sees the
/// full history and only ever adds to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagesState {
    pub messages: Vec<ChatMessage>,
}

impl MessagesState {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    /// Merge a node update into the state.
    pub fn apply(&mut self, update: Vec<ChatMessage>) {
        self.messages.extend(update);
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
