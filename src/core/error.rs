//! Error taxonomy for loading and running a SlackBook.
//!
//! Every variant is fatal to the run in progress. Load-time variants carry
//! the document [`Location`] of the offending entry.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Position of a task entry inside a SlackBook document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Source label, usually the file path
    pub source: String,

    /// 1-based index of the entry in the task sequence
    pub entry: usize,
}

impl Location {
    pub fn new(source: impl Into<String>, entry: usize) -> Self {
        Self {
            source: source.into(),
            entry,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, entry {}", self.source, self.entry)
    }
}

/// Failure reported by a resource module from `init`, `validate` or `apply`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{module}: {message}")]
pub struct ModuleError {
    /// Tag of the module that failed
    pub module: &'static str,

    /// Human-readable reason
    pub message: String,

    /// Output captured from external commands before the failure
    pub output: String,
}

impl ModuleError {
    pub fn new(module: &'static str, message: impl Into<String>) -> Self {
        Self {
            module,
            message: message.into(),
            output: String::new(),
        }
    }

    /// Attach captured command output to the error.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }
}

/// Engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The SlackBook file could not be read
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML
    #[error("invalid YAML in {source_name}: {source}")]
    Syntax {
        source_name: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// An entry is malformed (missing name or module, wrong field types)
    #[error("invalid task declaration found in: {location}: {message}")]
    Decode { location: Location, message: String },

    /// The module tag is not registered
    #[error("not supported module {module:?} found in: {location}")]
    UnknownModule { module: String, location: Location },

    /// Two entries share a name
    #[error("duplicated task name {task:?} found in: {location}")]
    DuplicateTask { task: String, location: Location },

    /// The module rejected its declared parameters
    #[error("task {task:?}: {source}: {location}")]
    Validation {
        task: String,
        location: Location,
        #[source]
        source: ModuleError,
    },

    /// The module could not inspect its environment
    #[error("task {task:?}: {source}: {location}")]
    Init {
        task: String,
        location: Location,
        #[source]
        source: ModuleError,
    },

    /// Reconciliation failed
    #[error("task {task:?} failed: {source}")]
    Apply {
        task: String,
        #[source]
        source: ModuleError,
    },

    /// A notify target is missing or is not a handler
    #[error("task {task:?}: notified task does not exist or is not a handler: {target:?}{}", at_location(.location))]
    NotifyTarget {
        task: String,
        target: String,
        location: Option<Location>,
    },
}

fn at_location(location: &Option<Location>) -> String {
    location
        .as_ref()
        .map(|l| format!(" ({})", l))
        .unwrap_or_default()
}

impl Error {
    /// Name of the task the error is attributed to, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            Self::DuplicateTask { task, .. }
            | Self::Validation { task, .. }
            | Self::Init { task, .. }
            | Self::Apply { task, .. }
            | Self::NotifyTarget { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Document location of a load-time error.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Decode { location, .. }
            | Self::UnknownModule { location, .. }
            | Self::DuplicateTask { location, .. }
            | Self::Validation { location, .. }
            | Self::Init { location, .. } => Some(location),
            Self::NotifyTarget { location, .. } => location.as_ref(),
            _ => None,
        }
    }
}
