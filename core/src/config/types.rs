use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::{RunOptions, DEFAULT_CAPTURE_BYTES};
use crate::error::ConfigError;
use crate::registry::{Registry, TaskEntry};
use crate::scoring::ScoringPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub scoring: ScoringPolicy,

    /// Merged over the built-in registry by name.
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or the run folder if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "wifidiag_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    false
}

fn default_logging_file() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Worker pool size; unset means one worker per task up to 8.
    #[serde(default)]
    pub concurrency: Option<usize>,

    #[serde(default = "default_global_deadline_secs")]
    pub global_deadline_secs: u64,

    /// Overrides every task's own timeout when set.
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,

    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    #[serde(default = "default_ipv6")]
    pub ipv6: bool,

    #[serde(default = "default_capture_bytes")]
    pub capture_bytes: usize,

    /// Wireless interface; detected when unset.
    #[serde(default)]
    pub interface: Option<String>,
}

fn default_global_deadline_secs() -> u64 {
    120
}

fn default_cancel_grace_ms() -> u64 {
    2_000
}

fn default_ipv6() -> bool {
    true
}

fn default_capture_bytes() -> usize {
    DEFAULT_CAPTURE_BYTES
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            global_deadline_secs: default_global_deadline_secs(),
            task_timeout_secs: None,
            cancel_grace_ms: default_cancel_grace_ms(),
            ipv6: default_ipv6(),
            capture_bytes: default_capture_bytes(),
            interface: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_capture_enabled")]
    pub enabled: bool,

    #[serde(default = "default_capture_program")]
    pub program: String,

    /// Rotation period handed to the capture tool (`-G`).
    #[serde(default = "default_capture_rotate_secs")]
    pub rotate_secs: u64,

    /// The capture runs at least this long, even when collection ends sooner.
    #[serde(default = "default_capture_min_secs")]
    pub min_duration_secs: u64,

    #[serde(default = "default_capture_filter")]
    pub filter: String,
}

fn default_capture_enabled() -> bool {
    true
}

fn default_capture_program() -> String {
    "tcpdump".to_string()
}

fn default_capture_rotate_secs() -> u64 {
    90
}

fn default_capture_min_secs() -> u64 {
    30
}

fn default_capture_filter() -> String {
    "icmp6 && ip6[40] == 134".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: default_capture_enabled(),
            program: default_capture_program(),
            rotate_secs: default_capture_rotate_secs(),
            min_duration_secs: default_capture_min_secs(),
            filter: default_capture_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Parent of every run folder; `~` is expanded.
    #[serde(default = "default_output_folder")]
    pub folder: String,

    #[serde(default = "default_true")]
    pub markdown: bool,

    /// Write one raw-output file per category.
    #[serde(default = "default_true")]
    pub raw: bool,
}

fn default_output_folder() -> String {
    "/var/tmp/wifidiag_reports".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: default_output_folder(),
            markdown: true,
            raw: true,
        }
    }
}

impl AppConfig {
    /// Reject values that would make a run meaningless before anything starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collector.concurrency == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "collector.concurrency",
                value: "0".into(),
            });
        }
        if self.collector.global_deadline_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "collector.global_deadline_secs",
                value: "0".into(),
            });
        }
        if self.collector.task_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "collector.task_timeout_secs",
                value: "0".into(),
            });
        }
        if self.collector.capture_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "collector.capture_bytes",
                value: "0".into(),
            });
        }
        if self.output.folder.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "output.folder",
                value: String::new(),
            });
        }
        self.scoring.validate()?;
        self.registry().map(|_| ())
    }

    pub fn to_run_options(&self) -> RunOptions {
        let c = &self.collector;
        RunOptions {
            concurrency_limit: c.concurrency,
            global_deadline: Duration::from_secs(c.global_deadline_secs),
            task_timeout: c.task_timeout_secs.map(Duration::from_secs),
            cancel_grace: Duration::from_millis(c.cancel_grace_ms),
            ipv6: c.ipv6,
            capture_bytes: c.capture_bytes,
        }
    }

    /// Built-in tasks with `[[tasks]]` merged on top.
    pub fn registry(&self) -> Result<Registry, ConfigError> {
        Registry::with_overrides(&self.tasks)
    }
}
