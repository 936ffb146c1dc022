use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::context::Context;
use crate::runner::{CancelSignal, CommandRunner, ProcessRunner};
use crate::store::{FrozenResults, ResultStore};

use super::progress::ProgressMonitor;
use super::scheduler::{dispatch_bounded, WorkerEvent};
use super::types::{TaskResult, TaskSpec, TaskStatus};

/// Runs a task set against one context and returns the frozen results
pub struct Collector {
    runner: Arc<dyn CommandRunner>,
    progress: bool,
}

pub struct CollectorBuilder {
    runner: Option<Arc<dyn CommandRunner>>,
    progress: bool,
}

impl Collector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            progress: false,
        }
    }

    pub fn builder() -> CollectorBuilder {
        CollectorBuilder::new()
    }

    /// Collector backed by local processes sized from the context's options.
    pub fn for_context(ctx: &Context) -> Self {
        Self::new(Arc::new(ProcessRunner::new(ctx.options.capture_bytes)))
    }

    /// Execute every spec applicable to `ctx.platform` and return once each
    /// has a result, or once the global deadline plus grace has passed.
    ///
    /// The returned key set is exactly the applicable subset of `specs`.
    pub async fn collect(&self, specs: &[TaskSpec], ctx: &Context) -> FrozenResults {
        let started = Instant::now();
        let selected: Vec<TaskSpec> = specs
            .iter()
            .filter(|s| s.applies_to(ctx.platform))
            .cloned()
            .collect();

        let total = selected.len();
        let workers = ctx.options.effective_concurrency(total);
        let deadline = ctx.options.global_deadline;
        let grace = ctx.options.cancel_grace;

        tracing::info!(
            platform = %ctx.platform,
            interface = %ctx.interface,
            tasks = total,
            skipped_by_platform = specs.len() - total,
            workers,
            deadline_ms = deadline.as_millis() as u64,
            runner = self.runner.name(),
            "collection started"
        );

        let mut store = ResultStore::with_capacity(total);
        let mut progress = ProgressMonitor::new(total, self.progress);

        let (cancel_handle, cancel) = CancelSignal::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut join = dispatch_bounded(
            selected.clone(),
            self.runner.clone(),
            Arc::new(ctx.clone()),
            workers,
            cancel,
            tx,
        );

        // Phase 1: wait for every worker or the deadline.
        let deadline_sleep = tokio::time::sleep(deadline);
        tokio::pin!(deadline_sleep);
        let mut deadline_hit = false;
        loop {
            tokio::select! {
                ev = rx.recv() => match ev {
                    Some(ev) => record(&mut store, &mut progress, ev),
                    None => break,
                },
                _ = &mut deadline_sleep => {
                    deadline_hit = true;
                    break;
                }
            }
        }

        // Phase 2: cancel stragglers and give them `grace` to report.
        if deadline_hit {
            tracing::warn!(
                pending = total - store.len(),
                "global deadline reached, cancelling running tasks"
            );
            progress.set_message("deadline reached, stopping tasks");
            cancel_handle.cancel();

            let grace_sleep = tokio::time::sleep(grace);
            tokio::pin!(grace_sleep);
            loop {
                tokio::select! {
                    ev = rx.recv() => match ev {
                        Some(ev) => record(&mut store, &mut progress, ev),
                        None => break,
                    },
                    _ = &mut grace_sleep => {
                        tracing::error!(
                            pending = total - store.len(),
                            "tasks ignored cancellation, aborting workers"
                        );
                        break;
                    }
                }
            }
        }

        shutdown(&mut join).await;
        while let Ok(ev) = rx.try_recv() {
            record(&mut store, &mut progress, ev);
        }

        for spec in &selected {
            if !store.contains(&spec.name) {
                let r = TaskResult::forced_timeout(spec, "not finished at global deadline");
                record(&mut store, &mut progress, WorkerEvent::Finished(r));
            }
        }

        progress.finish(deadline_hit);
        let frozen = store.freeze();

        tracing::info!(
            tasks = frozen.len(),
            ok = frozen.count(TaskStatus::Ok),
            failed = frozen.count(TaskStatus::Failed),
            timeout = frozen.count(TaskStatus::Timeout),
            skipped = frozen.count(TaskStatus::Skipped),
            deadline_hit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "collection finished"
        );

        frozen
    }
}

fn record(store: &mut ResultStore, progress: &mut ProgressMonitor, ev: WorkerEvent) {
    match ev {
        WorkerEvent::Started(name) => progress.start_task(&name),
        WorkerEvent::Finished(result) => {
            tracing::debug!(
                task = %result.name,
                status = %result.status,
                duration_ms = result.duration_ms,
                "task finished"
            );
            let (name, status, duration_ms) =
                (result.name.clone(), result.status, result.duration_ms);
            match store.insert(result) {
                Ok(()) => progress.complete_task(&name, status, duration_ms),
                Err(e) => tracing::error!(error = %e, "dropping duplicate task result"),
            }
        }
    }
}

/// Abort what is left and wait until every worker future is dropped, which
/// kills any child process still attached to it.
async fn shutdown(join: &mut JoinSet<()>) {
    join.abort_all();
    while let Some(res) = join.join_next().await {
        if let Err(e) = res {
            if e.is_panic() {
                tracing::error!(error = %e, "collector worker panicked");
            }
        }
    }
}

impl CollectorBuilder {
    pub fn new() -> Self {
        Self {
            runner: None,
            progress: false,
        }
    }

    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Show indicatif progress on stderr.
    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn build(self) -> Collector {
        Collector {
            runner: self
                .runner
                .unwrap_or_else(|| Arc::new(ProcessRunner::default())),
            progress: self.progress,
        }
    }
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect with local processes and an explicit worker pool size.
pub async fn collect(specs: &[TaskSpec], ctx: &Context, concurrency_limit: usize) -> FrozenResults {
    let mut ctx = ctx.clone();
    ctx.options.concurrency_limit = Some(concurrency_limit.max(1));
    Collector::for_context(&ctx).collect(specs, &ctx).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::context::{Platform, RunOptions};
    use crate::executor::types::{Category, CommandTemplate};

    /// Sleeps for the number of milliseconds in the command line, tracking
    /// how many calls overlap.
    struct SleepRunner {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SleepRunner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CommandRunner for SleepRunner {
        fn name(&self) -> &str {
            "sleep"
        }

        async fn execute(
            &self,
            spec: &TaskSpec,
            ctx: &Context,
            timeout: Duration,
            mut cancel: CancelSignal,
        ) -> TaskResult {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let ms: u64 = spec
                .command
                .for_platform(ctx.platform)
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            let status = tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(ms)) => TaskStatus::Ok,
                _ = tokio::time::sleep(timeout) => TaskStatus::Timeout,
                _ = cancel.cancelled() => TaskStatus::Timeout,
            };

            self.running.fetch_sub(1, Ordering::SeqCst);
            TaskResult::new(spec, status)
        }
    }

    fn ctx(options: RunOptions) -> Context {
        Context::new(Platform::Linux, "wlan0").with_options(options)
    }

    #[tokio::test]
    async fn respects_worker_limit() {
        let runner = SleepRunner::new();
        let collector = Collector::builder().runner(runner.clone()).build();
        let specs: Vec<_> = (0..6)
            .map(|i| TaskSpec::test(format!("t{i}"), Category::Latency, "50"))
            .collect();

        let out = collector
            .collect(
                &specs,
                &ctx(RunOptions {
                    concurrency_limit: Some(2),
                    ..RunOptions::default()
                }),
            )
            .await;

        assert_eq!(out.len(), 6);
        assert_eq!(out.count(TaskStatus::Ok), 6);
        assert!(runner.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn filters_by_platform() {
        let collector = Collector::new(SleepRunner::new());
        let specs = vec![
            TaskSpec::diagnostic("both", Category::System, "0"),
            TaskSpec::diagnostic(
                "darwin_only",
                Category::System,
                CommandTemplate::per_platform([(Platform::Darwin, "0")]),
            ),
            TaskSpec::diagnostic("filtered", Category::System, "0").with_platforms(&[Platform::Darwin]),
        ];

        let out = collector.collect(&specs, &ctx(RunOptions::default())).await;
        assert_eq!(out.names().collect::<Vec<_>>(), ["both"]);
    }

    #[tokio::test]
    async fn deadline_finalizes_running_and_queued_tasks() {
        let collector = Collector::new(SleepRunner::new());
        let specs = vec![
            TaskSpec::test("fast", Category::Latency, "10"),
            TaskSpec::test("slow", Category::Latency, "10000"),
            TaskSpec::test("queued", Category::Latency, "10000"),
        ];

        let started = Instant::now();
        let out = collector
            .collect(
                &specs,
                &ctx(RunOptions {
                    concurrency_limit: Some(2),
                    global_deadline: Duration::from_millis(300),
                    cancel_grace: Duration::from_millis(200),
                    ..RunOptions::default()
                }),
            )
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(out.len(), 3);
        assert_eq!(out.get("fast").unwrap().status, TaskStatus::Ok);
        assert_eq!(out.get("slow").unwrap().status, TaskStatus::Timeout);
        assert_eq!(out.get("queued").unwrap().status, TaskStatus::Timeout);
    }

    struct PanickingRunner;

    #[async_trait]
    impl CommandRunner for PanickingRunner {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn execute(
            &self,
            spec: &TaskSpec,
            _ctx: &Context,
            _timeout: Duration,
            _cancel: CancelSignal,
        ) -> TaskResult {
            if spec.name == "boom" {
                panic!("runner bug");
            }
            TaskResult::new(spec, TaskStatus::Ok)
        }
    }

    #[tokio::test]
    async fn a_panicking_task_does_not_take_siblings_down() {
        let collector = Collector::new(Arc::new(PanickingRunner));
        let specs = vec![
            TaskSpec::test("boom", Category::Connectivity, "x"),
            TaskSpec::test("fine", Category::Connectivity, "x"),
        ];

        let out = collector.collect(&specs, &ctx(RunOptions::default())).await;
        assert_eq!(out.get("boom").unwrap().status, TaskStatus::Failed);
        assert_eq!(out.get("fine").unwrap().status, TaskStatus::Ok);
    }
}
