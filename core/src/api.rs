//! Stable re-exports for consumers (`cli` and external crates).
//!
//! Prefer importing from `wifidiag_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load_default, load_from, AppConfig, CaptureConfig, CollectorConfig, LoggingConfig,
    OutputConfig,
};
pub use crate::context::{Context, Platform, RunOptions};
pub use crate::error::{CliError, ConfigError, ScoreError, StoreError};
pub use crate::executor::{
    collect, Category, Collector, CollectorBuilder, CommandTemplate, MetricParser, TaskKind,
    TaskResult, TaskSpec, TaskStatus,
};
pub use crate::registry::{CommandEntry, Registry, TaskEntry};
pub use crate::report::{
    assemble, assemble_with_capture, render_markdown, render_raw, render_text, CaptureSummary,
    CategorySection, KeyFact, KeyFacts, Report, ReportDocument,
};
pub use crate::runner::{execute, CancelHandle, CancelSignal, CommandRunner, ProcessRunner};
pub use crate::scoring::{
    score, CategoryRule, CategoryScore, Highlight, MetricThreshold, ScoreReport, ScoreTable,
    ScoringPolicy, Severity,
};
pub use crate::store::{FrozenResults, ResultStore};
pub use crate::{TOOL_NAME, VERSION};
