//! File resource: content, permission bits and ownership of a single file.
//!
//! Content drift is detected by comparing BLAKE3 digests of the declared
//! content and the file on disk. Owner and group accept names (resolved via
//! `getent`) or numeric ids.

use super::hasher;
use crate::core::error::ModuleError;
use crate::core::task::{Task, TaskBase};
use crate::transport::{find_program, local};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

const MODULE: &str = "file";

const STATES: [&str; 3] = ["", "present", "absent"];

/// Declared parameters of a file task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileFields {
    /// Destination path
    #[serde(default)]
    pub dest: String,

    /// Full file content; `None` leaves content alone
    #[serde(default)]
    pub content: Option<String>,

    /// Octal permission bits, e.g. "0644"
    #[serde(default, deserialize_with = "mode_string")]
    pub mode: Option<String>,

    #[serde(default)]
    pub owner: Option<String>,

    #[serde(default)]
    pub group: Option<String>,
}

/// `file` module instance.
#[derive(Debug, Default)]
pub struct FileTask {
    base: TaskBase,
    fields: FileFields,
}

impl FileTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &FileFields {
        &self.fields
    }

    fn apply_absent(&mut self, dest: &Path) -> Result<String, ModuleError> {
        if fs::symlink_metadata(dest).is_err() {
            return Ok(String::new());
        }
        fs::remove_file(dest).map_err(|e| io_error("remove", dest, e))?;
        self.base.mark_changed();
        Ok(format!("file: removed {}", dest.display()))
    }

    fn apply_present(&mut self, dest: &Path) -> Result<String, ModuleError> {
        let mut notes = Vec::new();

        match fs::metadata(dest) {
            Err(_) => {
                let content = self.fields.content.as_deref().unwrap_or("");
                fs::write(dest, content).map_err(|e| io_error("create", dest, e))?;
                notes.push(format!("created {}", dest.display()));
            }
            Ok(meta) if meta.is_dir() => {
                return Err(ModuleError::new(
                    MODULE,
                    format!("{} is a directory", dest.display()),
                ));
            }
            Ok(_) => {
                if let Some(content) = &self.fields.content {
                    let current =
                        hasher::hash_file(dest).map_err(|e| ModuleError::new(MODULE, e))?;
                    if current != hasher::hash_string(content) {
                        fs::write(dest, content).map_err(|e| io_error("write", dest, e))?;
                        notes.push(format!("content of {} updated", dest.display()));
                    }
                }
            }
        }

        let meta = fs::metadata(dest).map_err(|e| io_error("stat", dest, e))?;

        if let Some(mode) = parse_mode(self.fields.mode.as_deref())? {
            if meta.permissions().mode() & 0o7777 != mode {
                fs::set_permissions(dest, fs::Permissions::from_mode(mode))
                    .map_err(|e| io_error("chmod", dest, e))?;
                notes.push(format!("mode set to {:04o}", mode));
            }
        }

        let uid = match self.fields.owner.as_deref() {
            Some(owner) => Some(resolve_id("passwd", owner)?).filter(|uid| *uid != meta.uid()),
            None => None,
        };
        let gid = match self.fields.group.as_deref() {
            Some(group) => Some(resolve_id("group", group)?).filter(|gid| *gid != meta.gid()),
            None => None,
        };
        if uid.is_some() || gid.is_some() {
            std::os::unix::fs::chown(dest, uid, gid).map_err(|e| io_error("chown", dest, e))?;
            if let Some(owner) = uid.and(self.fields.owner.as_deref()) {
                notes.push(format!("owner set to {}", owner));
            }
            if let Some(group) = gid.and(self.fields.group.as_deref()) {
                notes.push(format!("group set to {}", group));
            }
        }

        if notes.is_empty() {
            return Ok(String::new());
        }
        self.base.mark_changed();
        Ok(notes
            .iter()
            .map(|n| format!("file: {}", n))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl Task for FileTask {
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
        self.base.default_state("present");
        Ok(())
    }

    fn validate(&self) -> Result<(), ModuleError> {
        if self.fields.dest.trim().is_empty() {
            return Err(ModuleError::new(MODULE, "destination path required"));
        }
        if !STATES.contains(&self.base.state.as_str()) {
            return Err(ModuleError::new(
                MODULE,
                format!("invalid state: {}", self.base.state),
            ));
        }
        parse_mode(self.fields.mode.as_deref())?;
        Ok(())
    }

    fn apply(&mut self) -> Result<String, ModuleError> {
        let dest = Path::new(&self.fields.dest).to_path_buf();
        if self.base.state == "absent" {
            self.apply_absent(&dest)
        } else {
            self.apply_present(&dest)
        }
    }
}

/// Parse octal permission bits. Accepts "0644", "644" and "0o644".
fn parse_mode(mode: Option<&str>) -> Result<Option<u32>, ModuleError> {
    let Some(raw) = mode else {
        return Ok(None);
    };
    let digits = raw.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    match u32::from_str_radix(digits, 8) {
        Ok(bits) if bits <= 0o7777 => Ok(Some(bits)),
        _ => Err(ModuleError::new(MODULE, format!("invalid mode: {}", raw))),
    }
}

/// YAML keeps a leading-zero scalar like `0644` as a string, but reads
/// `0o644`, `0x1a4` and `420` as the same integer. Such numbers no longer say
/// which base was meant, so they are rejected.
fn mode_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yaml_ng::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml_ng::Value::Null) => Ok(None),
        Some(serde_yaml_ng::Value::String(mode)) => Ok(Some(mode)),
        Some(serde_yaml_ng::Value::Number(n)) => Err(D::Error::custom(format!(
            "mode {} must be a quoted octal string, e.g. \"0644\"",
            n
        ))),
        Some(other) => Err(D::Error::custom(format!(
            "mode must be a quoted octal string, found {:?}",
            other
        ))),
    }
}

/// Resolve a user (`passwd`) or group (`group`) to its numeric id.
fn resolve_id(database: &str, name: &str) -> Result<u32, ModuleError> {
    if let Ok(id) = name.parse::<u32>() {
        return Ok(id);
    }
    let kind = if database == "passwd" { "user" } else { "group" };
    let getent = find_program("getent").map_err(|e| ModuleError::new(MODULE, e))?;
    let out = local::exec_local(&getent, &[database, name])
        .map_err(|e| ModuleError::new(MODULE, e))?;
    if !out.success() {
        return Err(ModuleError::new(MODULE, format!("unknown {}: {}", kind, name)));
    }
    parse_getent_id(&out.stdout)
        .ok_or_else(|| ModuleError::new(MODULE, format!("cannot parse {} entry for {}", kind, name)))
}

/// Third field of a `getent passwd|group` line.
fn parse_getent_id(line: &str) -> Option<u32> {
    line.lines().next()?.split(':').nth(2)?.trim().parse().ok()
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> ModuleError {
    ModuleError::new(MODULE, format!("cannot {} {}: {}", action, path.display(), e))
}
