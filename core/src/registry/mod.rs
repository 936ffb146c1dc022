//! Task Registry: the catalog of diagnostics and tests a run may execute.
//!
//! Built-in tasks come from [`builtin`]; configuration can replace them by
//! name or add new ones through [`Registry::merge`]. All validation happens
//! here, before any collection starts.
mod builtin;

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::Platform;
use crate::error::ConfigError;
use crate::executor::types::{Category, CommandTemplate, MetricParser, TaskKind, TaskSpec};

/// Command as written in configuration: one line, or a `{ linux = "...", darwin = "..." }` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandEntry {
    Single(String),
    PerPlatform(BTreeMap<String, String>),
}

/// One `[[tasks]]` entry from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub name: String,
    pub kind: String,

    #[serde(default = "default_category")]
    pub category: String,

    pub command: CommandEntry,

    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Empty means every platform the command supports.
    #[serde(default)]
    pub platforms: Vec<String>,

    #[serde(default)]
    pub ipv6: bool,

    #[serde(default)]
    pub parser: Option<String>,

    #[serde(default)]
    pub facts: Vec<String>,
}

fn default_category() -> String {
    Category::System.as_str().to_string()
}

impl TaskEntry {
    pub fn into_spec(self) -> Result<TaskSpec, ConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let kind = TaskKind::parse(&self.kind).ok_or_else(|| ConfigError::UnknownKind {
            task: name.clone(),
            kind: self.kind.clone(),
        })?;
        let category =
            Category::parse(&self.category).ok_or_else(|| ConfigError::UnknownCategory {
                task: name.clone(),
                category: self.category.clone(),
            })?;

        let command = match self.command {
            CommandEntry::Single(line) => CommandTemplate::Single(line),
            CommandEntry::PerPlatform(table) => {
                let mut map = BTreeMap::new();
                for (platform, line) in table {
                    map.insert(platform.parse::<Platform>()?, line);
                }
                CommandTemplate::PerPlatform(map)
            }
        };

        let platforms = self
            .platforms
            .iter()
            .map(|p| p.parse::<Platform>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut spec = TaskSpec::new(name.clone(), kind, category, command)
            .with_platforms(&platforms)
            .with_ipv6(self.ipv6)
            .with_facts(self.facts);
        if let Some(target) = self.target.filter(|t| !t.trim().is_empty()) {
            spec = spec.with_target(target);
        }
        if let Some(secs) = self.timeout_secs {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "tasks.timeout_secs",
                    value: format!("{name}: 0"),
                });
            }
            spec = spec.with_timeout(Duration::from_secs(secs));
        }
        if let Some(parser) = self.parser.as_deref() {
            let parsed = MetricParser::parse(parser).ok_or_else(|| ConfigError::UnknownParser {
                task: name.clone(),
                parser: parser.to_string(),
            })?;
            spec = spec.with_parser(parsed);
        }

        validate_spec(&spec)?;
        Ok(spec)
    }
}

fn validate_spec(spec: &TaskSpec) -> Result<(), ConfigError> {
    if spec.name.trim().is_empty() {
        return Err(ConfigError::EmptyName);
    }
    if spec.command.is_blank() {
        return Err(ConfigError::EmptyCommand(spec.name.clone()));
    }
    for pattern in &spec.facts {
        Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            task: spec.name.clone(),
            pattern: pattern.clone(),
            source,
        })?;
    }
    Ok(())
}

/// Validated, immutable set of task specs with unique names.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    specs: Vec<TaskSpec>,
}

impl Registry {
    /// The built-in tests followed by the built-in diagnostics.
    pub fn builtin() -> Self {
        let mut specs = builtin::tests();
        specs.extend(builtin::diagnostics());
        Self { specs }
    }

    pub fn from_specs(specs: Vec<TaskSpec>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::with_capacity(specs.len());
        for spec in &specs {
            validate_spec(spec)?;
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateTask(spec.name.clone()));
            }
        }
        Ok(Self { specs })
    }

    /// Built-in tasks with configuration entries merged on top.
    pub fn with_overrides(entries: &[TaskEntry]) -> Result<Self, ConfigError> {
        let mut registry = Self::builtin();
        registry.merge(entries)?;
        Ok(registry)
    }

    /// Replace specs whose name matches an entry and append the rest.
    ///
    /// All entries are validated before anything changes, and two entries
    /// with the same name are rejected.
    pub fn merge(&mut self, entries: &[TaskEntry]) -> Result<(), ConfigError> {
        let mut incoming = Vec::with_capacity(entries.len());
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            let spec = entry.clone().into_spec()?;
            if !seen.insert(spec.name.clone()) {
                return Err(ConfigError::DuplicateTask(spec.name));
            }
            incoming.push(spec);
        }

        for spec in incoming {
            match self.specs.iter_mut().find(|s| s.name == spec.name) {
                Some(existing) => {
                    tracing::debug!(task = %spec.name, "configured task replaces built-in");
                    *existing = spec;
                }
                None => {
                    tracing::debug!(task = %spec.name, "configured task added");
                    self.specs.push(spec);
                }
            }
        }
        Ok(())
    }

    pub fn specs(&self) -> &[TaskSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Specs that apply to `platform`, in registry order.
    pub fn select(&self, platform: Platform) -> Vec<TaskSpec> {
        self.specs
            .iter()
            .filter(|s| s.applies_to(platform))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::GATEWAY_TARGET;

    fn entry(name: &str, kind: &str, command: &str) -> TaskEntry {
        TaskEntry {
            name: name.into(),
            kind: kind.into(),
            category: "connectivity".into(),
            command: CommandEntry::Single(command.into()),
            target: None,
            timeout_secs: None,
            platforms: Vec::new(),
            ipv6: false,
            parser: None,
            facts: Vec::new(),
        }
    }

    #[test]
    fn builtin_registry_is_valid() {
        let builtin = Registry::builtin();
        let rebuilt = Registry::from_specs(builtin.specs().to_vec()).unwrap();
        assert_eq!(rebuilt.len(), builtin.len());

        let gw = builtin.get("gateway_ping6").unwrap();
        assert_eq!(gw.target.as_deref(), Some(GATEWAY_TARGET));
        assert!(gw.ipv6);
        assert!(builtin.get("google_dns_route").is_some());
        assert!(builtin.get("the_wlpc_traceroute").is_some());
    }

    #[test]
    fn selection_differs_per_platform() {
        let reg = Registry::builtin();
        let linux: Vec<_> = reg.select(Platform::Linux).into_iter().map(|s| s.name).collect();
        let darwin: Vec<_> = reg.select(Platform::Darwin).into_iter().map(|s| s.name).collect();

        assert!(linux.contains(&"iwconfig".to_string()));
        assert!(!linux.contains(&"airport".to_string()));
        assert!(darwin.contains(&"airport".to_string()));
        assert!(linux.contains(&"gateway_ipv4".to_string()));
        assert!(darwin.contains(&"gateway_ipv4".to_string()));
    }

    #[test]
    fn merge_replaces_by_name_and_appends_new() {
        let mut reg = Registry::builtin();
        let before = reg.len();
        reg.merge(&[
            entry("gateway_ping", "test", "ping -c 5 {target}"),
            entry("office_printer", "test", "ping -c 3 10.0.0.9"),
        ])
        .unwrap();

        assert_eq!(reg.len(), before + 1);
        let gw = reg.get("gateway_ping").unwrap();
        assert_eq!(gw.command, CommandTemplate::Single("ping -c 5 {target}".into()));
        assert_eq!(reg.specs().last().unwrap().name, "office_printer");
    }

    #[test]
    fn rejects_invalid_entries() {
        let mut reg = Registry::builtin();
        let err = reg.merge(&[entry("x", "probe", "true")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKind { .. }));

        let err = reg.merge(&[entry("x", "test", "   ")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCommand(name) if name == "x"));

        let err = reg
            .merge(&[entry("dup", "test", "true"), entry("dup", "diagnostic", "true")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTask(name) if name == "dup"));

        let mut bad_regex = entry("x", "test", "true");
        bad_regex.facts = vec!["(unclosed".into()];
        assert!(matches!(
            reg.merge(&[bad_regex]).unwrap_err(),
            ConfigError::InvalidPattern { .. }
        ));

        let mut bad_platform = entry("x", "test", "true");
        bad_platform.platforms = vec!["windows".into()];
        assert!(matches!(
            reg.merge(&[bad_platform]).unwrap_err(),
            ConfigError::UnknownPlatform(_)
        ));
    }

    #[test]
    fn failed_merge_leaves_registry_unchanged() {
        let mut reg = Registry::builtin();
        let before = reg.len();
        let result = reg.merge(&[entry("new_one", "test", "true"), entry("bad", "nope", "true")]);
        assert!(result.is_err());
        assert_eq!(reg.len(), before);
        assert!(reg.get("new_one").is_none());
    }

    #[test]
    fn from_specs_rejects_duplicates() {
        let err = Registry::from_specs(vec![
            TaskSpec::test("ping_v4", Category::Latency, "true"),
            TaskSpec::test("ping_v4", Category::Latency, "false"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTask(_)));
    }

    #[test]
    fn parses_entries_from_toml() {
        let text = r#"
            name = "router_admin"
            kind = "test"
            category = "connectivity"
            target = "192.168.1.1"
            timeout_secs = 10
            parser = "http"
            command = { linux = "curl -4Is http://{target}", darwin = "curl -4Is http://{target}" }
        "#;
        let entry: TaskEntry = toml::from_str(text).unwrap();
        let spec = entry.into_spec().unwrap();
        assert_eq!(spec.timeout, Duration::from_secs(10));
        assert_eq!(spec.parser, Some(MetricParser::Http));
        assert!(spec.applies_to(Platform::Darwin));
    }
}
