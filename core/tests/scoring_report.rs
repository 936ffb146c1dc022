mod common;

use common::{failed, fixture_specs, ok, store_of};
use pretty_assertions::assert_eq;
use wifidiag_core::api::{
    assemble, score, Category, Context, Platform, ScoreTable, ScoringPolicy, Severity, TaskResult,
    TaskStatus,
};

fn ctx() -> Context {
    Context::new(Platform::Linux, "wlan0").with_gateways(Some("192.168.1.1".into()), None)
}

#[test]
fn scoring_is_idempotent() {
    let specs = fixture_specs();
    let mut results: Vec<TaskResult> = specs.iter().map(ok).collect();
    results[1] = failed(&specs[1]);
    results[4].metrics.insert("rtt_avg_ms".into(), 250.0);
    let store = store_of(results);
    let table = ScoreTable::build(&ScoringPolicy::default(), &specs);

    let first = score(&store, &table).unwrap();
    let second = score(&store, &table).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn any_new_failure_never_raises_the_score() {
    let specs = fixture_specs();
    let policy = ScoringPolicy::default();
    let table = ScoreTable::build(&policy, &specs);
    let clean = score(&store_of(specs.iter().map(ok).collect()), &table).unwrap();
    assert_eq!(clean.score, clean.max_score);
    assert!(clean.is_clean());

    for (i, spec) in specs.iter().enumerate() {
        let mut results: Vec<TaskResult> = specs.iter().map(ok).collect();
        results[i] = failed(spec);
        let report = score(&store_of(results), &table).unwrap();

        assert!(
            report.score < clean.score,
            "failing {} left the score at {}",
            spec.name,
            report.score
        );
        assert!(
            report.highlights.iter().any(|h| h.task == spec.name),
            "no highlight names {}",
            spec.name
        );
    }
}

#[test]
fn core_connectivity_failure_is_critical_and_ranked_first() {
    let specs = fixture_specs();
    let mut results: Vec<TaskResult> = specs.iter().map(ok).collect();
    results[0] = failed(&specs[0]);
    results[6] = TaskResult::new(&specs[6], TaskStatus::Timeout).with_message("timed out after 5s");
    let store = store_of(results);
    let table = ScoreTable::build(&ScoringPolicy::default(), &specs);

    let report = score(&store, &table).unwrap();
    let first = &report.highlights[0];
    assert_eq!(first.task, "gateway_ping");
    assert_eq!(first.category, Category::Connectivity);
    assert_eq!(first.severity, Severity::Critical);
    assert!(report
        .highlights
        .windows(2)
        .all(|w| w[0] <= w[1]));
}

#[test]
fn insertion_order_does_not_change_rendering() {
    let specs = fixture_specs();
    let table = ScoreTable::build(&ScoringPolicy::default(), &specs);

    let forward = store_of(specs.iter().map(ok).collect());
    let reversed = store_of(specs.iter().rev().map(ok).collect());

    let a = assemble(&forward, &score(&forward, &table).unwrap(), &ctx());
    let b = assemble(&reversed, &score(&reversed, &table).unwrap(), &ctx());

    let results_block = |s: &str| s.split("\nResults\n").nth(1).unwrap_or_default().to_string();
    assert_eq!(results_block(&a.summary), results_block(&b.summary));

    let dns = b.document.section(Category::Dns).unwrap();
    let names: Vec<&str> = dns.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["facebook_nslookup", "google_com_nslookup"]);

    let summary = &b.summary;
    let fb = summary.find("facebook_nslookup").unwrap();
    let g = summary.find("google_com_nslookup").unwrap();
    assert!(fb < g);
}

#[test]
fn clean_run_report_lists_every_task_and_no_issues() {
    let specs = fixture_specs();
    let store = store_of(specs.iter().map(ok).collect());
    let table = ScoreTable::build(&ScoringPolicy::default(), &specs);
    let report = assemble(&store, &score(&store, &table).unwrap(), &ctx());

    assert!(report.summary.contains("no issues found"));
    assert!(report.summary.contains("gateway:    v4 192.168.1.1, v6 -"));
    for spec in &specs {
        assert!(report.summary.contains(&spec.name), "{} missing", spec.name);
    }
    assert_eq!(report.document.results().count(), specs.len());

    let json = report.document.to_json_pretty().unwrap();
    let back: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back["score"]["score"], 100.0);
}
