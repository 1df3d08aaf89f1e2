//! Run loop.
//!
//! Main pass: every non-handler task, in declaration order. A task that
//! changed something and names a handler queues that handler. Notification
//! pass: queued handlers, in the order they were first notified. The first
//! error ends the run; nothing already applied is rolled back.

use super::book::SlackBook;
use super::error::{Error, Result};
use super::task::BoxedTask;

/// Counts from a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tasks applied (both passes)
    pub applied: u32,
    /// Applies that performed a corrective action
    pub changed: u32,
    /// Applies that found the host already converged
    pub unchanged: u32,
    /// Handlers run in the notification pass
    pub notified: u32,
}

/// Run a loaded SlackBook.
pub fn run(book: &mut SlackBook) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    let order = book.names().to_vec();
    for name in &order {
        let Some(task) = book.get_mut(name) else {
            continue;
        };

        // Handler tasks can only be run through notifications
        if task.is_handler() {
            continue;
        }

        apply_task(task, &mut summary)?;

        if !task.changed() {
            continue;
        }
        if let Some(target) = task.notify().map(str::to_string) {
            enqueue_handler(book, name, &target)?;
        }
    }

    log::info!("-----> Running {} notified tasks...", book.queue.len());
    while let Some(name) = book.queue.dequeue() {
        let Some(task) = book.get_mut(&name) else {
            continue;
        };
        apply_task(task, &mut summary)?;
        summary.notified += 1;
    }

    Ok(summary)
}

fn apply_task(task: &mut BoxedTask, summary: &mut RunSummary) -> Result<()> {
    log::info!("-----> {}...", task.name());

    match task.apply() {
        Ok(output) => {
            log_output(&output);
            summary.applied += 1;
            if task.changed() {
                summary.changed += 1;
            } else {
                summary.unchanged += 1;
                log::debug!("{}: already converged", task.name());
            }
            Ok(())
        }
        Err(source) => {
            log_output(&source.output);
            Err(Error::Apply {
                task: task.name().to_string(),
                source,
            })
        }
    }
}

fn enqueue_handler(book: &mut SlackBook, notifier: &str, target: &str) -> Result<()> {
    match book.get(target) {
        Some(handler) if handler.is_handler() => {
            if book.queue.enqueue(target) {
                log::debug!("{} notified {}", notifier, target);
            } else {
                log::debug!("{} notified {} (already queued)", notifier, target);
            }
            Ok(())
        }
        _ => Err(Error::NotifyTarget {
            task: notifier.to_string(),
            target: target.to_string(),
            location: None,
        }),
    }
}

fn log_output(output: &str) {
    let output = output.trim_end();
    if !output.is_empty() {
        log::info!("{}", output);
    }
}
