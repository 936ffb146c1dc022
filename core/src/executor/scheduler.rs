use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::context::Context;
use crate::runner::{CancelSignal, CommandRunner};

use super::types::{TaskResult, TaskSpec, TaskStatus};

/// What workers report back to the aggregator.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Started(String),
    Finished(TaskResult),
}

/// Spawn one worker per spec, at most `max_concurrency` running at a time
///
/// # Arguments
///
/// * `specs` - Tasks already filtered to the context's platform
/// * `runner` - Executes a single task
/// * `max_concurrency` - Worker pool size
/// * `cancel` - Raised at the global deadline
/// * `tx` - Channel to the aggregator; closes once every worker is done
///
/// Every worker sends exactly one [`WorkerEvent::Finished`], unless it is
/// aborted after the cancel grace has run out.
pub(crate) fn dispatch_bounded(
    specs: Vec<TaskSpec>,
    runner: Arc<dyn CommandRunner>,
    ctx: Arc<Context>,
    max_concurrency: usize,
    cancel: CancelSignal,
    tx: mpsc::UnboundedSender<WorkerEvent>,
) -> JoinSet<()> {
    let sem = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut workers = JoinSet::new();

    for spec in specs {
        let sem = sem.clone();
        let runner = runner.clone();
        let ctx = ctx.clone();
        let mut cancel = cancel.clone();
        let tx = tx.clone();

        workers.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = sem.acquire_owned() => permit.ok(),
            };
            let Some(_permit) = permit else {
                tracing::warn!(task = %spec.name, "deadline reached before task started");
                let r = TaskResult::forced_timeout(&spec, "global deadline reached before start");
                let _ = tx.send(WorkerEvent::Finished(r));
                return;
            };

            let _ = tx.send(WorkerEvent::Started(spec.name.clone()));

            let timeout = ctx.options.task_timeout.unwrap_or(spec.timeout);
            let run = runner.execute(&spec, &ctx, timeout, cancel);
            let result = match AssertUnwindSafe(run).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!(task = %spec.name, runner = runner.name(), "runner panicked");
                    TaskResult::new(&spec, TaskStatus::Failed).with_message("runner panicked")
                }
            };

            let _ = tx.send(WorkerEvent::Finished(result));
        });
    }

    workers
}
