//! Apt resource: install or remove a Debian package.

use crate::core::error::ModuleError;
use crate::core::task::{Task, TaskBase};
use crate::transport::{find_program, local, ExecOutput};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const MODULE: &str = "apt";

const STATES: [&str; 3] = ["", "present", "absent"];

static DEINSTALLED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Status: deinstall.+").expect("valid deinstall pattern"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AptFields {
    /// Package to install or remove
    #[serde(default)]
    pub package: String,

    /// Refresh the package index before acting
    #[serde(default)]
    pub update_index: bool,
}

/// `apt` module instance. Tool paths are resolved during `init`.
#[derive(Debug, Default)]
pub struct AptTask {
    base: TaskBase,
    fields: AptFields,
    apt_get: PathBuf,
    dpkg_query: PathBuf,
}

impl AptTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &AptFields {
        &self.fields
    }

    fn installed(&self) -> Result<bool, ModuleError> {
        let out = run(&self.dpkg_query, &["--status", &self.fields.package])?;
        Ok(is_installed(&out))
    }

    fn update_index(&self) -> Result<String, ModuleError> {
        log::info!("Updating package index ...");
        let out = run(&self.apt_get, &["update"])?;
        if !out.success() {
            return Err(ModuleError::new(MODULE, "apt-get update failed").with_output(out.combined()));
        }
        Ok(out.combined())
    }
}

impl Task for AptTask {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn decode_fields(&mut self, fields: serde_yaml_ng::Value) -> Result<(), serde_yaml_ng::Error> {
        self.fields = serde_yaml_ng::from_value(fields)?;
        Ok(())
    }

    fn init(&mut self) -> Result<(), ModuleError> {
        self.dpkg_query = require("dpkg-query")?;
        self.apt_get = require("apt-get")?;
        self.base.default_state("present");
        Ok(())
    }

    fn validate(&self) -> Result<(), ModuleError> {
        if self.fields.package.trim().is_empty() && !self.fields.update_index {
            return Err(ModuleError::new(
                MODULE,
                "at least one package name is required",
            ));
        }
        if !STATES.contains(&self.base.state.as_str()) {
            return Err(ModuleError::new(
                MODULE,
                format!("invalid state: {}", self.base.state),
            ));
        }
        Ok(())
    }

    fn apply(&mut self) -> Result<String, ModuleError> {
        let has_package = !self.fields.package.trim().is_empty();
        let action = package_action(&self.base.state);

        if has_package {
            let installed = self.installed()?;
            if is_converged(action, installed) {
                return Ok(String::new());
            }
        }

        let mut output = String::new();
        if self.fields.update_index {
            output = self.update_index()?;
            if !has_package {
                return Ok(output);
            }
            log_output(&output);
            output.clear();
        }

        let out = run(&self.apt_get, &["-y", action, &self.fields.package])?;
        self.base.mark_changed();
        output.push_str(&out.combined());
        if !out.success() {
            return Err(ModuleError::new(
                MODULE,
                format!("apt-get {} {} failed", action, self.fields.package),
            )
            .with_output(output));
        }
        Ok(output)
    }
}

/// apt-get subcommand for a desired state.
fn package_action(state: &str) -> &'static str {
    if state == "absent" {
        "remove"
    } else {
        "install"
    }
}

fn is_converged(action: &str, installed: bool) -> bool {
    (action == "install" && installed) || (action == "remove" && !installed)
}

/// A package counts as installed when dpkg knows it and it is not marked
/// for deinstallation.
fn is_installed(status: &ExecOutput) -> bool {
    if !status.success() {
        return false;
    }
    !DEINSTALLED.is_match(&status.stdout)
}

fn require(program: &str) -> Result<PathBuf, ModuleError> {
    find_program(program).map_err(|e| ModuleError::new(MODULE, e))
}

fn run(program: &Path, args: &[&str]) -> Result<ExecOutput, ModuleError> {
    local::exec_local(program, args).map_err(|e| ModuleError::new(MODULE, e))
}

fn log_output(output: &str) {
    let output = output.trim_end();
    if !output.is_empty() {
        log::info!("{}", output);
    }
}
