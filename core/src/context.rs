use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_WORKER_CAP: usize = 8;
pub const DEFAULT_GLOBAL_DEADLINE: Duration = Duration::from_secs(120);
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(2);
pub const DEFAULT_CAPTURE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Darwin,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Linux, Platform::Darwin];

    /// Platform of the running host.
    pub fn current() -> Result<Self, ConfigError> {
        std::env::consts::OS.parse()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "darwin" | "macos" => Ok(Self::Darwin),
            other => Err(ConfigError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Knobs for one collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Worker pool size. `None` means one worker per task, capped at
    /// [`DEFAULT_WORKER_CAP`].
    pub concurrency_limit: Option<usize>,

    #[serde(with = "crate::util::serde_ms")]
    pub global_deadline: Duration,

    /// Replaces every task's own timeout when set.
    #[serde(with = "crate::util::serde_ms::option")]
    pub task_timeout: Option<Duration>,

    /// How long still-running workers get to stop after the deadline.
    #[serde(with = "crate::util::serde_ms")]
    pub cancel_grace: Duration,

    pub ipv6: bool,

    /// Bytes kept per output stream (tail).
    pub capture_bytes: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: None,
            global_deadline: DEFAULT_GLOBAL_DEADLINE,
            task_timeout: None,
            cancel_grace: DEFAULT_CANCEL_GRACE,
            ipv6: true,
            capture_bytes: DEFAULT_CAPTURE_BYTES,
        }
    }
}

impl RunOptions {
    pub fn effective_concurrency(&self, tasks: usize) -> usize {
        self.concurrency_limit
            .unwrap_or_else(|| tasks.min(DEFAULT_WORKER_CAP))
            .max(1)
    }
}

/// Read-only facts about the host, shared by every task of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub platform: Platform,
    pub interface: String,
    pub gateway_v4: Option<String>,
    pub gateway_v6: Option<String>,
    pub options: RunOptions,
}

impl Context {
    pub fn new(platform: Platform, interface: impl Into<String>) -> Self {
        Self {
            platform,
            interface: interface.into(),
            gateway_v4: None,
            gateway_v6: None,
            options: RunOptions::default(),
        }
    }

    pub fn with_gateways(mut self, v4: Option<String>, v6: Option<String>) -> Self {
        self.gateway_v4 = v4;
        self.gateway_v6 = v6;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn gateway(&self, ipv6: bool) -> Option<&str> {
        if ipv6 {
            self.gateway_v6.as_deref()
        } else {
            self.gateway_v4.as_deref()
        }
    }
}
