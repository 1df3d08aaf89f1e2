//! Engine: task contract, document loading, notification queue and run loop.

pub mod book;
pub mod error;
pub mod executor;
pub mod notify;
pub mod parser;
pub mod registry;
pub mod task;
