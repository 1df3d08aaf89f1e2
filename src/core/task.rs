//! Task contract shared by every resource module.
//!
//! A module embeds a [`TaskBase`] (the declared name, desired state, vars,
//! notify target and handler flag) and implements [`Task`]. The engine only
//! ever talks to `dyn Task`; the bookkeeping methods have default
//! implementations that delegate to the embedded base.

use super::error::ModuleError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Free-form variables attached to a task. Passed through, never interpreted.
pub type Vars = IndexMap<String, Vec<String>>;

/// Document keys owned by [`TaskBase`]. Every other key belongs to a module.
pub const BASE_KEYS: [&str; 5] = ["name", "state", "vars", "notify", "handler"];

/// Base state composed into every module instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskBase {
    /// Unique task name
    pub name: String,

    /// Desired state; vocabulary is module-defined
    #[serde(default)]
    pub state: String,

    /// Informational variables
    #[serde(default)]
    pub vars: Vars,

    /// Name of the handler to trigger when this task changes something
    #[serde(default, rename = "notify")]
    pub notify_task: String,

    /// Handler tasks only run through notifications
    #[serde(default)]
    pub handler: bool,

    #[serde(skip)]
    changed: bool,
}

impl TaskBase {
    /// Create a base with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Handler target, `None` when unset or empty.
    pub fn notify(&self) -> Option<&str> {
        match self.notify_task.trim() {
            "" => None,
            _ => Some(self.notify_task.as_str()),
        }
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn is_handler(&self) -> bool {
        self.handler
    }

    /// Record that the latest apply performed a corrective action.
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Fill in the desired state when the document omitted it.
    pub fn default_state(&mut self, state: &str) {
        if self.state.is_empty() {
            self.state = state.to_string();
        }
    }
}

/// Capability set every resource module exposes to the engine.
pub trait Task: fmt::Debug {
    /// Module tag this instance was built from (e.g. "apt").
    fn module(&self) -> &'static str;

    fn base(&self) -> &TaskBase;

    fn base_mut(&mut self) -> &mut TaskBase;

    /// Populate module-specific fields from the entry's remaining content.
    fn decode_fields(&mut self, fields: serde_yaml_ng::Value) -> Result<(), serde_yaml_ng::Error>;

    /// One-time environment probing. Runs once per load, after `validate`.
    fn init(&mut self) -> Result<(), ModuleError>;

    /// Pure check of the declared parameters.
    fn validate(&self) -> Result<(), ModuleError>;

    /// Converge external state to the declared state.
    ///
    /// Must inspect before acting: when reality already matches, perform no
    /// side effects and leave `changed` untouched. Returns output captured
    /// from external commands, for logging.
    fn apply(&mut self) -> Result<String, ModuleError>;

    fn name(&self) -> &str {
        &self.base().name
    }

    /// Handler to trigger. Only consulted when [`Task::changed`] is true.
    fn notify(&self) -> Option<&str> {
        self.base().notify()
    }

    /// Whether the most recent apply performed a corrective action.
    fn changed(&self) -> bool {
        self.base().changed()
    }

    fn is_handler(&self) -> bool {
        self.base().is_handler()
    }
}

/// Owned, type-erased task.
pub type BoxedTask = Box<dyn Task>;
