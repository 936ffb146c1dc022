use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::context::{Context, DEFAULT_CAPTURE_BYTES};
use crate::executor::types::{TaskResult, TaskSpec, TaskStatus};
use crate::metrics;
use crate::util::RingBytes;

use super::command::{bind, BindError};
use super::io_pump;
use super::traits::CommandRunner;
use super::types::CancelSignal;

/// How long a killed child gets to be reaped.
const KILL_REAP_GRACE: Duration = Duration::from_secs(2);
/// How long stream pumps get to hit EOF once the child is gone.
const PUMP_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runs tasks as local child processes.
pub struct ProcessRunner {
    capture_bytes: usize,
}

impl ProcessRunner {
    pub fn new(capture_bytes: usize) -> Self {
        Self {
            capture_bytes: capture_bytes.max(1),
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_BYTES)
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Execute one task outside of a collection run.
pub async fn execute(spec: &TaskSpec, ctx: &Context, timeout: Duration) -> TaskResult {
    ProcessRunner::new(ctx.options.capture_bytes)
        .execute(spec, ctx, timeout, CancelSignal::never())
        .await
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    fn name(&self) -> &str {
        "process"
    }

    async fn execute(
        &self,
        spec: &TaskSpec,
        ctx: &Context,
        timeout: Duration,
        mut cancel: CancelSignal,
    ) -> TaskResult {
        let bound = match bind(spec, ctx) {
            Ok(bound) => bound,
            Err(BindError::Skip(reason)) => {
                tracing::info!(task = %spec.name, %reason, "task skipped");
                return TaskResult::skipped(spec, reason);
            }
            Err(BindError::Invalid(msg)) => {
                tracing::warn!(task = %spec.name, error = %msg, "cannot bind command");
                let mut r = TaskResult::new(spec, TaskStatus::Failed);
                r.stdout = msg.clone();
                return r.with_message(msg);
            }
        };

        let clock = Instant::now();
        let mut result = TaskResult::new(spec, TaskStatus::Ok);
        result.command = bound.line.clone();
        result.target = bound.target.clone();

        tracing::info!(task = %spec.name, command = %bound.line, "starting subprocess");

        let mut cmd = Command::new(&bound.program);
        cmd.args(&bound.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down shell pipelines too.
        #[cfg(unix)]
        cmd.process_group(0);
        let spawned = cmd.spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let msg = format!("failed to start `{}`: {e}", bound.program);
                tracing::warn!(task = %spec.name, error = %e, "subprocess did not start");
                result.status = TaskStatus::Failed;
                result.stdout = msg.clone();
                result.message = Some(msg);
                return finish(result, clock);
            }
        };

        let ring_out = RingBytes::new(self.capture_bytes);
        let ring_err = RingBytes::new(self.capture_bytes);
        let mut pumps: Vec<JoinHandle<u64>> = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            pumps.push(io_pump::pump(out, ring_out.clone(), "stdout"));
        }
        if let Some(err) = child.stderr.take() {
            pumps.push(io_pump::pump(err, ring_err.clone(), "stderr"));
        }

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
            _ = cancel.cancelled() => Outcome::Cancelled,
        };

        if !matches!(outcome, Outcome::Exited(_)) {
            terminate(&mut child, &spec.name).await;
        }
        drain(pumps).await;

        result.stdout = ring_out.to_string_lossy();
        result.stderr = ring_err.to_string_lossy();

        match outcome {
            Outcome::Exited(Ok(status)) => {
                result.exit_code = status.code();
                if status.success() {
                    result.status = TaskStatus::Ok;
                } else {
                    result.status = TaskStatus::Failed;
                    if result.exit_code.is_none() {
                        result.message = Some("terminated by signal".to_string());
                    }
                }
            }
            Outcome::Exited(Err(e)) => {
                result.status = TaskStatus::Failed;
                result.message = Some(format!("waiting for process failed: {e}"));
            }
            Outcome::TimedOut => {
                tracing::warn!(task = %spec.name, ?timeout, "subprocess timed out");
                result.status = TaskStatus::Timeout;
                result.message = Some(format!("timed out after {timeout:?}"));
            }
            Outcome::Cancelled => {
                tracing::warn!(task = %spec.name, "subprocess cancelled at global deadline");
                result.status = TaskStatus::Timeout;
                result.message = Some("cancelled at global deadline".to_string());
            }
        }

        if result.status != TaskStatus::Timeout {
            result.metrics = metrics::extract(spec.parser, &result.stdout);
        }
        if !spec.facts.is_empty() {
            let combined = format!("{}{}", result.stdout, result.stderr);
            result.facts = metrics::extract_facts(&spec.facts, &combined);
        }

        finish(result, clock)
    }
}

fn finish(mut result: TaskResult, clock: Instant) -> TaskResult {
    result.finished_at = Utc::now();
    result.duration_ms = clock.elapsed().as_millis() as u64;
    result
}

async fn terminate(child: &mut Child, task: &str) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        kill_process_group(pid, task).await;
    }
    if let Err(e) = child.start_kill() {
        tracing::debug!(%task, error = %e, "kill failed, process may have exited");
    }
    if tokio::time::timeout(KILL_REAP_GRACE, child.wait()).await.is_err() {
        tracing::error!(%task, "process still running after kill");
    }
}

#[cfg(unix)]
async fn kill_process_group(pid: u32, task: &str) {
    let group = format!("-{pid}");
    let status = Command::new("kill")
        .args(["-9", "--", &group])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match tokio::time::timeout(KILL_REAP_GRACE, status).await {
        Ok(Ok(s)) if s.success() => {}
        Ok(Ok(s)) => tracing::debug!(%task, pid, code = ?s.code(), "process group kill refused"),
        Ok(Err(e)) => tracing::debug!(%task, pid, error = %e, "cannot run kill"),
        Err(_) => tracing::debug!(%task, pid, "kill did not return in time"),
    }
}

async fn drain(pumps: Vec<JoinHandle<u64>>) {
    for mut pump in pumps {
        if tokio::time::timeout(PUMP_DRAIN_GRACE, &mut pump).await.is_err() {
            // A grandchild may still hold the pipe open.
            pump.abort();
        }
    }
}
