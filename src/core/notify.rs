//! Notification queue: handlers triggered during the main pass, released after it.
//!
//! Entries are task names: they reference handlers owned by the SlackBook
//! task map and never own a task themselves. A name is accepted at most once
//! per queue instance, which gives the "one apply per handler per run"
//! guarantee even when several notifiers target the same handler.

use std::collections::{HashSet, VecDeque};

/// FIFO of handler names with at-most-once admission.
#[derive(Debug, Default, Clone)]
pub struct NotificationQueue {
    pending: VecDeque<String>,
    admitted: HashSet<String>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler at the tail. Returns false if it was already admitted.
    pub fn enqueue(&mut self, task: &str) -> bool {
        if !self.admitted.insert(task.to_string()) {
            return false;
        }
        self.pending.push_back(task.to_string());
        true
    }

    /// Pop the oldest pending handler.
    pub fn dequeue(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    /// Number of pending handlers.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
