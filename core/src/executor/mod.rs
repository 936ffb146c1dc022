//! Concurrent collector for diagnostic and test tasks
//!
//! Fans the applicable task specs out over a bounded worker pool and folds
//! the results into a single [`ResultStore`](crate::store::ResultStore).
//!
//! # Architecture
//!
//! ```text
//! &[TaskSpec]
//!   ↓  filter by Context.platform
//! dispatch_bounded()  → JoinSet of workers, Semaphore(limit)
//!   ↓  each worker: CommandRunner::execute(spec, ctx, timeout, cancel)
//! mpsc<WorkerEvent>   → aggregator (sole store writer)
//!   ↓  global deadline → cancel, grace, abort, synthesize timeouts
//! ResultStore::freeze() → FrozenResults
//! ```

mod engine;
mod progress;
mod scheduler;
pub mod types;

pub use engine::{collect, Collector, CollectorBuilder};
pub use progress::ProgressMonitor;
pub use types::{Category, CommandTemplate, MetricParser, TaskKind, TaskResult, TaskSpec, TaskStatus};
