//! Module registry: maps a document tag to a factory of blank tasks.

use super::task::BoxedTask;
use crate::resources;
use std::collections::HashMap;
use std::fmt;

/// Produces a fresh, blank task instance.
pub type Factory = Box<dyn Fn() -> BoxedTask>;

/// Tag → factory table consulted by the loader.
#[derive(Default)]
pub struct ModuleRegistry {
    factories: HashMap<String, Factory>,
}

impl ModuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the modules shipped in this crate: apt, file, service.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        resources::register_builtin(&mut registry);
        registry
    }

    /// Register a factory for `tag`, replacing any previous one.
    pub fn register<F>(&mut self, tag: &str, factory: F)
    where
        F: Fn() -> BoxedTask + 'static,
    {
        self.factories.insert(tag.to_string(), Box::new(factory));
    }

    /// Build a blank task for `tag`, or `None` if the tag is unknown.
    pub fn resolve(&self, tag: &str) -> Option<BoxedTask> {
        self.factories.get(tag).map(|factory| factory())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
