//! Bounded conversation history for one chat session.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// One answered query.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub query: String,
    pub response: String,
    pub at: DateTime<Utc>,
}

/// FIFO of the most recent turns; pushing past `capacity` evicts the oldest.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, query: impl Into<String>, response: impl Into<String>) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(ConversationTurn {
            query: query.into(),
            response: response.into(),
            at: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Up to `n` most recent turns, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().skip(self.turns.len().saturating_sub(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }
}
