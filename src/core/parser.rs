//! SlackBook document loading.
//!
//! Walks the YAML task sequence in order and, for every entry:
//! - requires a `name` and a module tag (the first non-base key)
//! - resolves the tag through the [`ModuleRegistry`]
//! - decodes base fields, then module fields (the tag's mapping merged with
//!   any extra keys inlined at the entry's top level)
//! - runs `validate`, then `init`
//! - rejects duplicate names
//!
//! Once every entry is loaded, notify targets of non-handler tasks are
//! checked: each must name a task flagged as a handler.

use super::book::SlackBook;
use super::error::{Error, Location, Result};
use super::registry::ModuleRegistry;
use super::task::{TaskBase, BASE_KEYS};
use serde_yaml_ng::{Mapping, Value};
use std::path::Path;

/// Base keys accepted inside the module mapping as well as at the top level.
const NESTED_BASE_KEYS: [&str; 4] = ["state", "vars", "notify", "handler"];

/// Load a SlackBook from disk.
pub fn parse_book_file(path: &Path, registry: &ModuleRegistry) -> Result<SlackBook> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_book(&content, &path.display().to_string(), registry)
}

/// Load a SlackBook from a YAML string. `source` labels error locations.
pub fn parse_book(yaml: &str, source: &str, registry: &ModuleRegistry) -> Result<SlackBook> {
    let mut book = SlackBook::new(source);
    if yaml.trim().is_empty() {
        return Ok(book);
    }

    let doc: Value = serde_yaml_ng::from_str(yaml).map_err(|e| Error::Syntax {
        source_name: source.to_string(),
        source: e,
    })?;

    let entries = match doc {
        Value::Null => Vec::new(),
        Value::Sequence(entries) => entries,
        _ => {
            return Err(Error::Decode {
                location: Location::new(source, 0),
                message: "a slackbook must be a sequence of tasks".to_string(),
            })
        }
    };

    let mut locations = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let location = Location::new(source, index + 1);
        let name = load_entry(&mut book, registry, entry, &location)?;
        locations.push((name, location));
    }

    check_notify_targets(&book, &locations)?;
    Ok(book)
}

/// Decode one entry into a task and register it. Returns the task name.
fn load_entry(
    book: &mut SlackBook,
    registry: &ModuleRegistry,
    entry: Value,
    location: &Location,
) -> Result<String> {
    let decl = split_entry(entry, location)?;

    let mut task = registry
        .resolve(&decl.module)
        .ok_or_else(|| Error::UnknownModule {
            module: decl.module.clone(),
            location: location.clone(),
        })?;

    let base: TaskBase = serde_yaml_ng::from_value(Value::Mapping(decl.base))
        .map_err(|e| decode_error(location, e.to_string()))?;
    let name = base.name.clone();
    *task.base_mut() = base;

    let fields = module_fields(&decl.module, decl.module_value, decl.inline)
        .map_err(|message| decode_error(location, message))?;
    task.decode_fields(fields)
        .map_err(|e| decode_error(location, format!("{}: {}", decl.module, e)))?;

    task.validate().map_err(|source| Error::Validation {
        task: name.clone(),
        location: location.clone(),
        source,
    })?;

    task.init().map_err(|source| Error::Init {
        task: name.clone(),
        location: location.clone(),
        source,
    })?;

    log::debug!(
        "loaded task {:?} ({}, state {:?}) from {}",
        name,
        decl.module,
        task.base().state,
        location
    );

    book.insert(task).map_err(|_| Error::DuplicateTask {
        task: name.clone(),
        location: location.clone(),
    })?;

    Ok(name)
}

/// An entry split into base keys, module tag and module content.
struct Declaration {
    base: Mapping,
    module: String,
    module_value: Value,
    inline: Mapping,
}

fn split_entry(entry: Value, location: &Location) -> Result<Declaration> {
    let mapping = match entry {
        Value::Mapping(mapping) => mapping,
        _ => return Err(decode_error(location, "task entry must be a mapping")),
    };

    match mapping.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => {}
        Some(_) => return Err(decode_error(location, "task name must be a non-empty string")),
        None => return Err(decode_error(location, "task name is required")),
    }

    let mut base = Mapping::new();
    let mut module: Option<(String, Value)> = None;
    let mut inline = Mapping::new();

    for (key, value) in mapping {
        let key = match key {
            Value::String(key) => key,
            other => {
                return Err(decode_error(
                    location,
                    format!("keys must be strings, found {:?}", other),
                ))
            }
        };
        if BASE_KEYS.contains(&key.as_str()) {
            base.insert(Value::String(key), value);
        } else if module.is_none() {
            module = Some((key, value));
        } else {
            inline.insert(Value::String(key), value);
        }
    }

    let (module, mut module_value) =
        module.ok_or_else(|| decode_error(location, "task declares no module"))?;

    // Base keys may also sit under the module tag; `name` there belongs to
    // the module (e.g. the service name).
    if let Value::Mapping(fields) = &mut module_value {
        for key in NESTED_BASE_KEYS {
            let Some(value) = fields.remove(key) else {
                continue;
            };
            if base.contains_key(key) {
                return Err(decode_error(
                    location,
                    format!("{:?} is declared both on the task and under {:?}", key, module),
                ));
            }
            base.insert(Value::String(key.to_string()), value);
        }
    }

    Ok(Declaration {
        base,
        module,
        module_value,
        inline,
    })
}

/// Merge the tag's mapping with fields inlined at the top level.
fn module_fields(
    module: &str,
    value: Value,
    inline: Mapping,
) -> std::result::Result<Value, String> {
    let mut fields = match value {
        Value::Null => Mapping::new(),
        Value::Mapping(fields) => fields,
        other => {
            return Err(format!(
                "module {:?} expects a mapping of fields, found {:?}",
                module, other
            ))
        }
    };
    for (key, value) in inline {
        fields.insert(key, value);
    }
    Ok(Value::Mapping(fields))
}

fn check_notify_targets(book: &SlackBook, locations: &[(String, Location)]) -> Result<()> {
    for (name, location) in locations {
        let Some(task) = book.get(name) else {
            continue;
        };
        let Some(target) = task.notify() else {
            continue;
        };
        if task.is_handler() {
            log::warn!(
                "handler {:?} notifies {:?}; handlers do not trigger further notifications, ignoring",
                name,
                target
            );
            continue;
        }
        match book.get(target) {
            Some(handler) if handler.is_handler() => {}
            _ => {
                return Err(Error::NotifyTarget {
                    task: name.clone(),
                    target: target.to_string(),
                    location: Some(location.clone()),
                })
            }
        }
    }
    Ok(())
}

fn decode_error(location: &Location, message: impl Into<String>) -> Error {
    Error::Decode {
        location: location.clone(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ModuleError;
    use crate::core::task::Task;
    use serde::Deserialize;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records the lifecycle calls the loader makes.
    #[derive(Debug, Default, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct RecorderFields {
        #[serde(default)]
        path: String,
        #[serde(default)]
        fail_validate: bool,
        #[serde(default)]
        fail_init: bool,
    }

    #[derive(Debug)]
    struct Recorder {
        base: TaskBase,
        fields: RecorderFields,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl Task for Recorder {
        fn module(&self) -> &'static str {
            "record"
        }
        fn base(&self) -> &TaskBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut TaskBase {
            &mut self.base
        }
        fn decode_fields(&mut self, fields: Value) -> std::result::Result<(), serde_yaml_ng::Error> {
            self.fields = serde_yaml_ng::from_value(fields)?;
            Ok(())
        }
        fn init(&mut self) -> std::result::Result<(), ModuleError> {
            self.calls.borrow_mut().push(format!("init:{}", self.base.name));
            if self.fields.fail_init {
                return Err(ModuleError::new("record", "tool not found in PATH"));
            }
            self.base.default_state("present");
            Ok(())
        }
        fn validate(&self) -> std::result::Result<(), ModuleError> {
            self.calls.borrow_mut().push(format!("validate:{}", self.base.name));
            if self.fields.fail_validate {
                return Err(ModuleError::new("record", "bad parameters"));
            }
            Ok(())
        }
        fn apply(&mut self) -> std::result::Result<String, ModuleError> {
            self.calls.borrow_mut().push(format!("apply:{}", self.base.name));
            Ok(String::new())
        }
    }

    fn registry() -> (ModuleRegistry, Rc<RefCell<Vec<String>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        let shared = Rc::clone(&calls);
        registry.register("record", move || {
            Box::new(Recorder {
                base: TaskBase::default(),
                fields: RecorderFields::default(),
                calls: Rc::clone(&shared),
            })
        });
        (registry, calls)
    }

    fn load(yaml: &str) -> Result<SlackBook> {
        let (registry, _) = registry();
        parse_book(yaml, "test.yaml", &registry)
    }

    #[test]
    fn test_parse_ordered_tasks() {
        let book = load(
            r#"
- name: zeta
  record:
    path: /z
- name: alpha
  record:
    path: /a
- name: mid
  record: {}
"#,
        )
        .unwrap();
        assert_eq!(book.names(), ["zeta", "alpha", "mid"]);
        assert_eq!(book.source(), "test.yaml");
    }

    #[test]
    fn test_parse_base_fields() {
        let book = load(
            r#"
- name: web config
  record:
    path: /etc/web.conf
  state: absent
  vars:
    hosts: [a, b]
  notify: reload web
- name: reload web
  record:
  handler: true
"#,
        )
        .unwrap();
        let task = book.get("web config").unwrap();
        assert_eq!(task.base().state, "absent");
        assert_eq!(task.notify(), Some("reload web"));
        assert_eq!(task.base().vars["hosts"], vec!["a", "b"]);
        assert!(!task.is_handler());
        assert!(book.get("reload web").unwrap().is_handler());
    }

    #[test]
    fn test_init_fills_default_state() {
        let book = load("- name: a\n  record: {}\n").unwrap();
        assert_eq!(book.get("a").unwrap().base().state, "present");
    }

    #[test]
    fn test_inline_module_fields() {
        let (registry, calls) = registry();
        let yaml = r#"
- name: inline
  record:
  fail_validate: true
"#;
        let err = parse_book(yaml, "test.yaml", &registry).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(*calls.borrow(), vec!["validate:inline"]);
    }

    #[test]
    fn test_inline_overrides_nested() {
        let book = load(
            r#"
- name: both
  record:
    fail_init: true
  fail_init: false
"#,
        )
        .unwrap();
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_validate_runs_before_init() {
        let (registry, calls) = registry();
        parse_book("- name: a\n  record: {}\n", "test.yaml", &registry).unwrap();
        assert_eq!(*calls.borrow(), vec!["validate:a", "init:a"]);
    }

    #[test]
    fn test_loading_never_applies() {
        let (registry, calls) = registry();
        parse_book(
            "- name: a\n  record: {}\n- name: b\n  record: {}\n",
            "test.yaml",
            &registry,
        )
        .unwrap();
        assert!(calls.borrow().iter().all(|c| !c.starts_with("apply:")));
    }

    #[test]
    fn test_empty_document() {
        assert!(load("").unwrap().is_empty());
        assert!(load("   \n").unwrap().is_empty());
        assert!(load("[]").unwrap().is_empty());
        assert!(load("~").unwrap().is_empty());
    }

    #[test]
    fn test_top_level_not_sequence() {
        let err = load("name: a\nrecord: {}\n").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = load("- name: [unclosed").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
        assert!(err.to_string().contains("test.yaml"));
    }

    #[test]
    fn test_entry_not_mapping() {
        let err = load("- just a string\n").unwrap_err();
        match err {
            Error::Decode { location, .. } => assert_eq!(location.entry, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_name() {
        let err = load("- name: ok\n  record: {}\n- record: {}\n").unwrap_err();
        match err {
            Error::Decode { location, message } => {
                assert_eq!(location.entry, 2);
                assert!(message.contains("name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_name_not_string() {
        let err = load("- name: [a, b]\n  record: {}\n").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_missing_module() {
        let err = load("- name: lonely\n  state: present\n").unwrap_err();
        match err {
            Error::Decode { message, .. } => assert!(message.contains("no module")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_module() {
        let err = load("- name: a\n  record: {}\n- name: b\n  yum:\n    package: curl\n").unwrap_err();
        match err {
            Error::UnknownModule { module, location } => {
                assert_eq!(module, "yum");
                assert_eq!(location, Location::new("test.yaml", 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_module_value_not_mapping() {
        let err = load("- name: a\n  record: 42\n").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_unknown_module_field() {
        let err = load("- name: a\n  record:\n    colour: blue\n").unwrap_err();
        match err {
            Error::Decode { message, .. } => assert!(message.starts_with("record:")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_base_field_type() {
        let err = load("- name: a\n  record: {}\n  handler: sometimes\n").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_validation_error_carries_location() {
        let err = load("- name: a\n  record:\n    fail_validate: true\n").unwrap_err();
        match &err {
            Error::Validation { task, location, source } => {
                assert_eq!(task, "a");
                assert_eq!(location.entry, 1);
                assert_eq!(source.message, "bad parameters");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("record: bad parameters"));
    }

    #[test]
    fn test_init_error() {
        let err = load("- name: a\n  record:\n    fail_init: true\n").unwrap_err();
        assert!(matches!(err, Error::Init { .. }));
        assert_eq!(err.task(), Some("a"));
    }

    #[test]
    fn test_duplicate_name() {
        let (registry, calls) = registry();
        let yaml = r#"
- name: deploy
  record: {}
- name: other
  record: {}
- name: deploy
  record: {}
"#;
        let err = parse_book(yaml, "test.yaml", &registry).unwrap_err();
        match err {
            Error::DuplicateTask { task, location } => {
                assert_eq!(task, "deploy");
                assert_eq!(location.entry, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(calls.borrow().iter().all(|c| !c.starts_with("apply:")));
    }

    #[test]
    fn test_notify_target_declared_later() {
        let book = load(
            r#"
- name: config
  record: {}
  notify: restart
- name: restart
  record: {}
  handler: true
"#,
        )
        .unwrap();
        assert_eq!(book.handler_count(), 1);
    }

    #[test]
    fn test_notify_target_missing() {
        let err = load("- name: config\n  record: {}\n  notify: ghost\n").unwrap_err();
        match err {
            Error::NotifyTarget { task, target, location } => {
                assert_eq!(task, "config");
                assert_eq!(target, "ghost");
                assert_eq!(location.map(|l| l.entry), Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_notify_target_not_handler() {
        let err = load(
            r#"
- name: config
  record: {}
  notify: plain
- name: plain
  record: {}
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotifyTarget { .. }));
    }

    #[test]
    fn test_parse_book_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.yaml");
        std::fs::write(&path, "- name: a\n  record: {}\n").unwrap();
        let (registry, _) = registry();
        let book = parse_book_file(&path, &registry).unwrap();
        assert_eq!(book.len(), 1);
        assert!(book.source().ends_with("site.yaml"));
    }

    #[test]
    fn test_parse_book_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, _) = registry();
        let err = parse_book_file(&dir.path().join("nope.yaml"), &registry).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn test_base_keys_under_module_tag() {
        let book = load(
            r#"
- name: config
  record:
    path: /etc/app.conf
    notify: restart
- name: restart
  record:
    state: restarted
    handler: true
    vars:
      reason: [config]
"#,
        )
        .unwrap();
        assert_eq!(book.get("config").unwrap().notify(), Some("restart"));
        let restart = book.get("restart").unwrap();
        assert!(restart.is_handler());
        assert_eq!(restart.base().state, "restarted");
        assert_eq!(restart.base().vars["reason"], vec!["config"]);
    }

    #[test]
    fn test_base_key_declared_twice() {
        let err = load("- name: a\n  state: absent\n  record:\n    state: present\n").unwrap_err();
        match err {
            Error::Decode { message, location } => {
                assert!(message.contains("\"state\""), "got: {message}");
                assert_eq!(location.entry, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_name_under_module_tag_stays_with_module() {
        let err = load("- name: a\n  record:\n    name: b\n").unwrap_err();
        match err {
            Error::Decode { message, .. } => assert!(message.starts_with("record:")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_handler_notify_target_not_checked() {
        let book = load(
            r#"
- name: config
  record: {}
  notify: restart
- name: restart
  record: {}
  handler: true
  notify: ghost
"#,
        )
        .unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.get("restart").unwrap().notify(), Some("ghost"));
    }
}
