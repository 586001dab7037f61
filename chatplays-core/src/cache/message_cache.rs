// File: src/cache/message_cache.rs

use std::collections::VecDeque;

use chatplays_common::models::{ChatMessage, Identity};

pub const DEFAULT_CHAT_CAPACITY: usize = 40;

/// Recent chat lines for the overlay, oldest first, capped at `capacity`.
#[derive(Debug)]
pub struct ChatHistory {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
}

impl ChatHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends and evicts from the front past capacity. Returns how many
    /// messages were evicted.
    pub fn push(&mut self, message: ChatMessage) -> usize {
        self.messages.push_back(message);
        let mut evicted = 0;
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn apply_identity(&mut self, identity: &Identity) -> bool {
        let mut changed = false;
        for message in self.messages.iter_mut() {
            changed |= message.apply_identity(identity);
        }
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn to_vec(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_CAPACITY)
    }
}
