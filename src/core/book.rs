//! SlackBook, the run aggregate owning every task of one document.

use super::notify::NotificationQueue;
use super::task::{BoxedTask, Task};
use std::collections::HashMap;

/// Tasks of one document: a name-keyed map plus the declaration order.
#[derive(Debug, Default)]
pub struct SlackBook {
    /// Where the document came from (file path or label)
    source: String,

    tasks: HashMap<String, BoxedTask>,

    /// Task names in declaration order
    order: Vec<String>,

    pub(crate) queue: NotificationQueue,
}

impl SlackBook {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Add a task at the end of the declaration order.
    ///
    /// Returns the task back if its name is already taken; the existing
    /// entry is never overwritten.
    pub fn insert(&mut self, task: BoxedTask) -> Result<(), BoxedTask> {
        if self.tasks.contains_key(task.name()) {
            return Err(task);
        }
        let name = task.name().to_string();
        self.order.push(name.clone());
        self.tasks.insert(name, task);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Task> {
        self.tasks.get(name).map(|t| t.as_ref())
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut BoxedTask> {
        self.tasks.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Task names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Tasks in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Task> + '_ {
        self.order.iter().filter_map(|name| self.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of handler tasks.
    pub fn handler_count(&self) -> usize {
        self.tasks.values().filter(|t| t.is_handler()).count()
    }

    /// Handlers waiting for the notification pass.
    pub fn pending_notifications(&self) -> usize {
        self.queue.len()
    }
}
