//! Command execution on the local host.
//!
//! Resource modules inspect and converge the system by running package and
//! service tools. Programs are resolved once against `PATH` during `init`
//! (see [`find_program`]) and invoked directly afterwards, never through a
//! shell.

pub mod local;

use std::path::PathBuf;

/// Output from running an external program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr, the way a terminal would interleave them.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Resolve a program name against `PATH`.
pub fn find_program(program: &str) -> Result<PathBuf, String> {
    which::which(program).map_err(|e| format!("{}: {}", program, e))
}
