//! SlackBot: provision a single host from a YAML SlackBook.
//!
//! A SlackBook is an ordered list of tasks, each handled by a resource
//! module (apt, file, service). Tasks run in declaration order; a task that
//! changes something can notify a handler, which runs once after the main
//! pass.

pub mod cli;
pub mod core;
pub mod resources;
pub mod transport;
