use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::Platform;

pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Target placeholder resolved from the context's default gateway.
pub const GATEWAY_TARGET: &str = "{gateway}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Diagnostic,
    Test,
}

impl TaskKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diagnostic" => Some(Self::Diagnostic),
            "test" => Some(Self::Test),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Diagnostic => "diagnostic",
            Self::Test => "test",
        }
    }
}

/// Scoring and rendering group. Variant order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Connectivity,
    Dns,
    Latency,
    LinkQuality,
    System,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Connectivity,
        Category::Dns,
        Category::Latency,
        Category::LinkQuality,
        Category::System,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Dns => "dns",
            Self::Latency => "latency",
            Self::LinkQuality => "link-quality",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which metric extractor runs over a task's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricParser {
    Ping,
    Http,
    Dns,
    Wireless,
    TcpStats,
}

impl MetricParser {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ping" => Some(Self::Ping),
            "http" => Some(Self::Http),
            "dns" => Some(Self::Dns),
            "wireless" => Some(Self::Wireless),
            "tcp-stats" | "tcp_stats" => Some(Self::TcpStats),
            _ => None,
        }
    }
}

/// A command line with `{target}` / `{interface}` placeholders, either shared
/// by every platform or given per platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandTemplate {
    Single(String),
    PerPlatform(BTreeMap<Platform, String>),
}

impl CommandTemplate {
    pub fn per_platform<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Platform, S)>,
        S: Into<String>,
    {
        Self::PerPlatform(entries.into_iter().map(|(p, s)| (p, s.into())).collect())
    }

    pub fn for_platform(&self, platform: Platform) -> Option<&str> {
        match self {
            Self::Single(s) => Some(s.as_str()),
            Self::PerPlatform(map) => map.get(&platform).map(String::as_str),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Single(s) => s.trim().is_empty(),
            Self::PerPlatform(map) => map.is_empty() || map.values().any(|s| s.trim().is_empty()),
        }
    }
}

impl From<&str> for CommandTemplate {
    fn from(s: &str) -> Self {
        Self::Single(s.to_string())
    }
}

impl From<String> for CommandTemplate {
    fn from(s: String) -> Self {
        Self::Single(s)
    }
}

/// Immutable description of one diagnostic or test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSpec {
    pub name: String,
    pub kind: TaskKind,
    pub category: Category,
    pub command: CommandTemplate,
    pub target: Option<String>,
    #[serde(with = "crate::util::serde_ms")]
    pub timeout: Duration,
    /// Empty means every platform.
    pub platforms: Vec<Platform>,
    pub ipv6: bool,
    pub parser: Option<MetricParser>,
    /// Regular expressions whose matches are kept as key facts.
    pub facts: Vec<String>,
}

impl TaskSpec {
    pub fn new(
        name: impl Into<String>,
        kind: TaskKind,
        category: Category,
        command: impl Into<CommandTemplate>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            category,
            command: command.into(),
            target: None,
            timeout: DEFAULT_TASK_TIMEOUT,
            platforms: Vec::new(),
            ipv6: false,
            parser: None,
            facts: Vec::new(),
        }
    }

    pub fn diagnostic(
        name: impl Into<String>,
        category: Category,
        command: impl Into<CommandTemplate>,
    ) -> Self {
        Self::new(name, TaskKind::Diagnostic, category, command)
    }

    pub fn test(
        name: impl Into<String>,
        category: Category,
        command: impl Into<CommandTemplate>,
    ) -> Self {
        Self::new(name, TaskKind::Test, category, command)
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_platforms(mut self, platforms: &[Platform]) -> Self {
        self.platforms = platforms.to_vec();
        self
    }

    pub fn with_ipv6(mut self, ipv6: bool) -> Self {
        self.ipv6 = ipv6;
        self
    }

    pub fn with_parser(mut self, parser: MetricParser) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn with_facts<I, S>(mut self, facts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facts = facts.into_iter().map(Into::into).collect();
        self
    }

    pub fn applies_to(&self, platform: Platform) -> bool {
        (self.platforms.is_empty() || self.platforms.contains(&platform))
            && self.command.for_platform(platform).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_platform_template_limits_applicability() {
        let spec = TaskSpec::diagnostic(
            "gateway_ipv4",
            Category::Connectivity,
            CommandTemplate::per_platform([(Platform::Linux, "ip -4 route list")]),
        );
        assert!(spec.applies_to(Platform::Linux));
        assert!(!spec.applies_to(Platform::Darwin));
    }

    #[test]
    fn platform_filter_applies_to_single_template() {
        let spec = TaskSpec::diagnostic("wdutil", Category::LinkQuality, "wdutil info")
            .with_platforms(&[Platform::Darwin]);
        assert!(spec.applies_to(Platform::Darwin));
        assert!(!spec.applies_to(Platform::Linux));
    }

    #[test]
    fn category_names_round_trip_through_parse() {
        for c in Category::ALL {
            assert_eq!(Category::parse(c.as_str()), Some(c));
        }
        assert_eq!(Category::parse("Link-Quality"), Some(Category::LinkQuality));
        assert_eq!(Category::parse("wifi"), None);
    }
}
