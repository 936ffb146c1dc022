use serde::Serialize;
use wifidiag_core::api::{Platform, Registry, TaskSpec};

#[derive(Debug, Serialize)]
struct TaskRow<'a> {
    name: &'a str,
    kind: &'a str,
    category: &'a str,
    command: &'a str,
    target: Option<&'a str>,
    timeout_secs: u64,
    ipv6: bool,
}

fn row(spec: &TaskSpec, platform: Platform) -> TaskRow<'_> {
    TaskRow {
        name: &spec.name,
        kind: spec.kind.as_str(),
        category: spec.category.as_str(),
        command: spec.command.for_platform(platform).unwrap_or_default(),
        target: spec.target.as_deref(),
        timeout_secs: spec.timeout.as_secs(),
        ipv6: spec.ipv6,
    }
}

/// Tasks a run on `platform` would execute, in registry order.
pub fn render(registry: &Registry, platform: Platform, json: bool) -> serde_json::Result<String> {
    let selected = registry.select(platform);
    let rows: Vec<TaskRow<'_>> = selected.iter().map(|s| row(s, platform)).collect();
    if json {
        return serde_json::to_string_pretty(&rows);
    }

    let mut out = format!("{} tasks for {platform}\n", rows.len());
    for r in &rows {
        out.push_str(&format!(
            "  {:<26} {:<10} {:<13} {:>4}s  {}\n",
            r.name, r.kind, r.category, r.timeout_secs, r.command
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_tasks_for_the_platform() {
        let reg = Registry::builtin();
        let linux = render(&reg, Platform::Linux, false).unwrap();
        assert!(linux.contains("journalctl"));
        assert!(!linux.contains("system_profiler"));

        let darwin = render(&reg, Platform::Darwin, true).unwrap();
        let rows: serde_json::Value = serde_json::from_str(&darwin).unwrap();
        let names: Vec<&str> = rows
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|r| r["name"].as_str())
            .collect();
        assert!(names.contains(&"airport"));
        assert!(!names.contains(&"iw_dev"));
    }
}
