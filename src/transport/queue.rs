//! Bounded FIFO of messages waiting for a live connection.

use std::collections::VecDeque;
use tracing::warn;

use crate::protocol::messages::OutboundMessage;

/// Outbound queue owned by the session task.
///
/// When full, the oldest message is discarded to make room.
#[derive(Debug)]
pub struct OutboundQueue {
    items: VecDeque<OutboundMessage>,
    capacity: usize,
    dropped: u64,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            dropped: 0,
        }
    }

    /// Appends a message, discarding the oldest one if the queue is full.
    pub fn push(&mut self, message: OutboundMessage) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
            self.dropped += 1;
            warn!(
                "Outbound queue full ({} messages), dropped oldest ({} total)",
                self.capacity, self.dropped
            );
        }
        self.items.push_back(message);
    }

    #[must_use]
    pub fn front(&self) -> Option<&OutboundMessage> {
        self.items.front()
    }

    pub fn pop_front(&mut self) -> Option<OutboundMessage> {
        self.items.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Messages discarded because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
