//! Built-in resource modules.
//!
//! Each module inspects the host before acting and only marks itself
//! changed when it performed a corrective action.

pub mod apt;
pub mod file;
pub mod hasher;
pub mod service;

use crate::core::registry::ModuleRegistry;

pub use apt::AptTask;
pub use file::FileTask;
pub use service::ServiceTask;

/// Register apt, file and service under their document tags.
pub fn register_builtin(registry: &mut ModuleRegistry) {
    registry.register("apt", || Box::new(AptTask::new()));
    registry.register("file", || Box::new(FileTask::new()));
    registry.register("service", || Box::new(ServiceTask::new()));
}
