//! Wireless diagnostics collection engine.
//!
//! Fans a registry of diagnostic and test tasks out over a bounded worker
//! pool, collects one [`TaskResult`](executor::types::TaskResult) per task
//! into an insert-only store, scores the frozen store and assembles a report.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod registry;
pub mod report;
pub mod runner;
pub mod scoring;
pub mod store;
pub mod util;

pub const TOOL_NAME: &str = "wifidiag";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
