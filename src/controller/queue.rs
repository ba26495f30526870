//! Input queue for user prompts submitted while a turn is in flight.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One queued prompt.
#[derive(Clone, Debug)]
pub struct QueuedInput {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl QueuedInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// FIFO buffer of queued prompts.
///
/// The controller keeps this mirror of the conversation's queue so listeners
/// can observe queue depth consistently: the front entry is removed when its
/// message starts, before the start event fans out.
#[derive(Debug, Default)]
pub struct InputQueue {
    items: VecDeque<QueuedInput>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, text: impl Into<String>) -> Uuid {
        let input = QueuedInput::new(text);
        let id = input.id;
        self.items.push_back(input);
        id
    }

    /// Remove the front entry when its text matches exactly.
    pub fn dequeue_front_if(&mut self, text: &str) -> bool {
        if self.items.front().is_some_and(|i| i.text == text) {
            self.items.pop_front();
            true
        } else {
            false
        }
    }

    /// Remove and return every queued text, in enqueue order.
    pub fn drain(&mut self) -> Vec<String> {
        self.items.drain(..).map(|i| i.text).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The queued texts, in enqueue order.
    pub fn texts(&self) -> Vec<String> {
        self.items.iter().map(|i| i.text.clone()).collect()
    }
}
