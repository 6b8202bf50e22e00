#![forbid(unsafe_code)]

use crate::error::TaskDbError;
use std::collections::BTreeMap;
use std::path::Path;
use td_core::TaskDefaults;

const DEFAULTS: &[(&str, &str)] = &[("gc", "1"), ("purge.on-sync", "0")];

/// rc-style settings: `key=value` lines, `#` starts a comment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            values: DEFAULTS
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, TaskDbError> {
        let mut config = Self::default();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(TaskDbError::Configuration(format!(
                    "line {}: expected key=value, got {line:?}",
                    index + 1
                )));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(TaskDbError::Configuration(format!(
                    "line {}: missing key",
                    index + 1
                )));
            }
            config.set(key, value.trim());
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TaskDbError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            TaskDbError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Missing keys read as the empty string.
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(
            self.get(key).to_ascii_lowercase().as_str(),
            "1" | "y" | "yes" | "on" | "true"
        )
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn task_defaults(&self) -> TaskDefaults {
        let project = self.get("default.project");
        TaskDefaults {
            project: (!project.is_empty()).then(|| project.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults() {
        let config = Config::new();
        assert!(config.get_bool("gc"));
        assert!(!config.get_bool("purge.on-sync"));
        assert_eq!(config.get("sync.server.url"), "");
        assert!(config.task_defaults().project.is_none());
    }

    #[test]
    fn parse_handles_comments_and_whitespace() {
        let config = Config::parse(
            "# taskrc\n\
             gc = off\n\
             default.project=home   # trailing\n\
             \n\
             sync.local.server_dir = /srv/tasks\n",
        )
        .expect("parse config");
        assert!(!config.get_bool("gc"));
        assert_eq!(config.get("default.project"), "home");
        assert_eq!(config.get("sync.local.server_dir"), "/srv/tasks");
        assert_eq!(config.task_defaults().project.as_deref(), Some("home"));
    }

    #[test]
    fn parse_rejects_lines_without_a_value() {
        let err = Config::parse("gc=1\nbogus\n").expect_err("bad line");
        match err {
            TaskDbError::Configuration(message) => assert!(message.starts_with("line 2")),
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn booleans_are_case_insensitive() {
        let mut config = Config::new();
        for value in ["1", "Y", "yes", "ON", "True"] {
            config.set("flag", value);
            assert!(config.get_bool("flag"), "{value}");
        }
        for value in ["0", "no", "off", "", "maybe"] {
            config.set("flag", value);
            assert!(!config.get_bool("flag"), "{value}");
        }
    }
}
