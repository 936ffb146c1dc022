#![allow(dead_code)]

use std::time::Duration;

use wifidiag_core::api::{
    Category, Context, FrozenResults, Platform, ResultStore, RunOptions, TaskResult, TaskSpec,
    TaskStatus,
};

pub fn host_platform() -> Platform {
    Platform::current().unwrap_or(Platform::Linux)
}

pub fn other_platform(p: Platform) -> Platform {
    match p {
        Platform::Linux => Platform::Darwin,
        Platform::Darwin => Platform::Linux,
    }
}

pub fn ctx_with(options: RunOptions) -> Context {
    Context::new(host_platform(), "lo").with_options(options)
}

pub fn quick_options(deadline: Duration) -> RunOptions {
    RunOptions {
        global_deadline: deadline,
        cancel_grace: Duration::from_millis(500),
        ..RunOptions::default()
    }
}

pub fn test_spec(name: &str, category: Category, command: &str) -> TaskSpec {
    TaskSpec::test(name, category, command).with_timeout(Duration::from_secs(5))
}

/// A frozen store holding one result per spec, inserted in the given order.
pub fn store_of(results: Vec<TaskResult>) -> FrozenResults {
    let mut store = ResultStore::new();
    for r in results {
        store.insert(r).expect("unique task names");
    }
    store.freeze()
}

pub fn ok(spec: &TaskSpec) -> TaskResult {
    TaskResult::new(spec, TaskStatus::Ok)
}

pub fn failed(spec: &TaskSpec) -> TaskResult {
    let mut r = TaskResult::new(spec, TaskStatus::Failed);
    r.exit_code = Some(1);
    r
}

/// A run touching every category.
pub fn fixture_specs() -> Vec<TaskSpec> {
    vec![
        test_spec("gateway_ping", Category::Connectivity, "true"),
        test_spec("google_com_curl", Category::Connectivity, "true"),
        test_spec("google_com_nslookup", Category::Dns, "true"),
        test_spec("facebook_nslookup", Category::Dns, "true"),
        test_spec("google_dns_ping", Category::Latency, "true"),
        test_spec("iwconfig", Category::LinkQuality, "true"),
        test_spec("tcp_stats", Category::LinkQuality, "true"),
        test_spec("hostnamectl", Category::System, "true"),
    ]
}
