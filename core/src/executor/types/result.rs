use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{Category, TaskKind, TaskSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Ok,
    Failed,
    Timeout,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of executing one [`TaskSpec`].
///
/// Built by the worker that ran the task and never modified once it has been
/// inserted into the result store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub name: String,
    pub kind: TaskKind,
    pub category: Category,

    /// Rendered command line, empty when the template could not be bound.
    pub command: String,
    pub target: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,

    /// `None` when the process never started or was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,

    pub metrics: BTreeMap<String, f64>,
    pub facts: Vec<String>,

    pub status: TaskStatus,

    /// Why the task timed out, was skipped or could not start.
    pub message: Option<String>,
}

impl TaskResult {
    /// Fresh result for `spec`, stamped as starting and finishing now.
    pub fn new(spec: &TaskSpec, status: TaskStatus) -> Self {
        let now = Utc::now();
        Self {
            name: spec.name.clone(),
            kind: spec.kind,
            category: spec.category,
            command: String::new(),
            target: spec.target.clone(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            metrics: BTreeMap::new(),
            facts: Vec::new(),
            status,
            message: None,
        }
    }

    pub fn skipped(spec: &TaskSpec, reason: impl Into<String>) -> Self {
        let mut r = Self::new(spec, TaskStatus::Skipped);
        r.message = Some(reason.into());
        r
    }

    /// Timeout result for a task the collector had to finalize itself.
    pub fn forced_timeout(spec: &TaskSpec, reason: impl Into<String>) -> Self {
        let mut r = Self::new(spec, TaskStatus::Timeout);
        r.message = Some(reason.into());
        r
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == TaskStatus::Ok
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TaskStatus::Skipped
    }
}
