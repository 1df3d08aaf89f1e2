//! Service resource: drive SysV/Upstart services through the `service` tool.

use crate::core::error::ModuleError;
use crate::core::task::{Task, TaskBase};
use crate::transport::{find_program, local, ExecOutput};
use serde::Deserialize;
use std::path::PathBuf;

const MODULE: &str = "service";

const STATES: [&str; 5] = ["", "started", "stopped", "restarted", "reloaded"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceFields {
    /// Service name; the task name is used when omitted
    #[serde(default)]
    pub name: Option<String>,
}

/// `service` module instance.
#[derive(Debug, Default)]
pub struct ServiceTask {
    base: TaskBase,
    fields: ServiceFields,
    service: PathBuf,
}

impl ServiceTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name passed to the `service` tool.
    pub fn service_name(&self) -> &str {
        match self.fields.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.base.name,
        }
    }

    fn running(&self) -> Result<bool, ModuleError> {
        let out = local::exec_local(&self.service, &[self.service_name(), "status"])
            .map_err(|e| ModuleError::new(MODULE, e))?;
        Ok(is_running(&out))
    }
}

impl Task for ServiceTask {
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
        self.service = find_program("service").map_err(|e| ModuleError::new(MODULE, e))?;
        self.base.default_state("started");
        Ok(())
    }

    fn validate(&self) -> Result<(), ModuleError> {
        if !STATES.contains(&self.base.state.as_str()) {
            return Err(ModuleError::new(
                MODULE,
                format!("invalid state: {}", self.base.state),
            ));
        }
        Ok(())
    }

    fn apply(&mut self) -> Result<String, ModuleError> {
        let running = self.running()?;
        let Some(action) = service_action(&self.base.state, running)? else {
            return Ok(String::new());
        };

        let name = self.service_name().to_string();
        let out = local::exec_local(&self.service, &[&name, action])
            .map_err(|e| ModuleError::new(MODULE, e))?;
        if !out.success() {
            return Err(
                ModuleError::new(MODULE, format!("service {} {} failed", name, action))
                    .with_output(out.combined()),
            );
        }
        self.base.mark_changed();
        Ok(out.combined())
    }
}

/// Command needed to move a service from its current state to `state`,
/// or `None` when it is already there.
fn service_action(state: &str, running: bool) -> Result<Option<&'static str>, ModuleError> {
    let action = match (state, running) {
        ("started", true) | ("stopped", false) => None,
        ("started", false) => Some("start"),
        ("stopped", true) => Some("stop"),
        ("restarted", true) => Some("restart"),
        ("reloaded", true) => Some("reload"),
        ("restarted" | "reloaded", false) => Some("start"),
        _ => {
            return Err(ModuleError::new(
                MODULE,
                format!("invalid state: {}", state),
            ))
        }
    };
    Ok(action)
}

/// `service <name> status` exits 0 for a running service on most init
/// systems; Upstart and older scripts only say so in their output.
fn is_running(status: &ExecOutput) -> bool {
    if status.success() {
        return true;
    }
    let text = status.combined();
    text.contains("is running") || text.contains("start/running")
}
