use std::collections::HashMap;

use crate::state::ChatMessage;

/// Per-target append-only message history.
///
/// A target only accepts messages once its log has been opened; anything
/// addressed to an unopened target is dropped, never buffered.
#[derive(Debug, Default)]
pub struct MessageLog {
    logs: HashMap<String, Vec<ChatMessage>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, target_id: &str) {
        self.logs.entry(target_id.to_string()).or_default();
    }

    /// Returns `false` when the message was dropped.
    pub fn append(&mut self, target_id: &str, message: ChatMessage) -> bool {
        match self.logs.get_mut(target_id) {
            Some(log) => {
                log.push(message);
                true
            }
            None => false,
        }
    }

    pub fn history(&self, target_id: &str) -> &[ChatMessage] {
        self.logs.get(target_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, target_id: &str) -> usize {
        self.history(target_id).len()
    }

    pub fn last(&self, target_id: &str) -> Option<&ChatMessage> {
        self.history(target_id).last()
    }
}
