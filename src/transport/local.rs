//! Run a program on the local host and capture its output.

use super::ExecOutput;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run `program` with `args`, waiting for it to exit.
///
/// A program killed by a signal reports exit code -1. Only a failure to
/// spawn or wait is an `Err`; a non-zero exit is returned as output.
pub fn exec_local(program: &Path, args: &[&str]) -> Result<ExecOutput, String> {
    log::debug!("exec: {} {}", program.display(), args.join(" "));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| format!("failed to spawn {}: {}", program.display(), e))?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
