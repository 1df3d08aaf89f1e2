//! CLI subcommands: run, validate.

use crate::core::{executor, parser, registry::ModuleRegistry};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a SlackBook and converge the host to it
    Run {
        /// Path to the SlackBook YAML file
        slackbook_file: PathBuf,

        /// Log detected state and executed commands
        #[arg(short, long)]
        verbose: bool,
    },

    /// Load and validate a SlackBook without applying anything
    Validate {
        /// Path to the SlackBook YAML file
        slackbook_file: PathBuf,
    },
}

impl Commands {
    /// Whether debug logging was requested.
    pub fn verbose(&self) -> bool {
        matches!(self, Commands::Run { verbose: true, .. })
    }
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    let registry = ModuleRegistry::builtin();
    match cmd {
        Commands::Run { slackbook_file, .. } => cmd_run(&slackbook_file, &registry),
        Commands::Validate { slackbook_file } => cmd_validate(&slackbook_file, &registry),
    }
}

fn cmd_run(file: &Path, registry: &ModuleRegistry) -> Result<(), String> {
    let mut book = parser::parse_book_file(file, registry).map_err(|e| e.to_string())?;
    let summary = executor::run(&mut book).map_err(|e| e.to_string())?;

    log::info!(
        "{} applied: {} changed, {} unchanged, {} notified",
        summary.applied,
        summary.changed,
        summary.unchanged,
        summary.notified
    );
    println!("Done");
    Ok(())
}

fn cmd_validate(file: &Path, registry: &ModuleRegistry) -> Result<(), String> {
    let book = parser::parse_book_file(file, registry).map_err(|e| e.to_string())?;
    println!(
        "OK: {} ({} tasks, {} handlers)",
        file.display(),
        book.len(),
        book.handler_count()
    );
    Ok(())
}
