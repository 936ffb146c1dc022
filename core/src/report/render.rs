use crate::executor::types::{TaskResult, TaskStatus};
use crate::scoring::{CategoryScore, ScoreReport};

use super::assemble::{CaptureSummary, CategorySection, ReportDocument};
use super::key_facts::KeyFacts;

const NO_ISSUES: &str = "no issues found";

fn fmt_points(v: f64) -> String {
    format!("{v:.1}")
}

fn score_line(score: &ScoreReport) -> String {
    format!(
        "{}/{} ({}/{} tasks ok)",
        fmt_points(score.score),
        fmt_points(score.max_score),
        score.passed,
        score.total
    )
}

fn category_line(c: &CategoryScore) -> String {
    let points = if c.active {
        format!("{}/{}", fmt_points(c.points), fmt_points(c.weight))
    } else {
        "n/a".to_string()
    };
    format!(
        "{:<14} {:>11}  ok {}  failed {}  timeout {}  skipped {}  degraded {}",
        c.category.as_str(),
        points,
        c.ok,
        c.failed,
        c.timeout,
        c.skipped,
        c.degraded
    )
}

fn key_fact_lines(kf: &KeyFacts) -> Vec<String> {
    let width = kf.facts.iter().map(|f| f.label.len()).max().unwrap_or(0);
    let mut lines: Vec<String> = kf
        .facts
        .iter()
        .map(|f| format!("{:<width$}  {}", format!("{}:", f.label), f.value, width = width + 1))
        .collect();
    lines.extend(kf.warnings.iter().map(|w| format!("! {w}")));
    lines
}

/// Key facts then the highlights, as printed to the terminal after a run.
pub fn render_highlights(doc: &ReportDocument) -> String {
    let mut out = String::new();
    for line in key_fact_lines(&doc.key_facts) {
        out.push_str(&format!("{line}\n"));
    }
    if !doc.key_facts.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!("Score: {}\n", score_line(&doc.score)));
    if doc.score.highlights.is_empty() {
        out.push_str(&format!("  {NO_ISSUES}\n"));
    } else {
        for (i, h) in doc.score.highlights.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, h));
        }
    }
    out
}

fn capture_line(cap: &CaptureSummary) -> String {
    match &cap.error {
        Some(e) => format!("capture failed: {e}"),
        None => format!("router advertisements received: {}", cap.router_advertisements),
    }
}

fn gateways(doc: &ReportDocument) -> String {
    let ctx = &doc.context;
    format!(
        "v4 {}, v6 {}",
        ctx.gateway_v4.as_deref().unwrap_or("-"),
        ctx.gateway_v6.as_deref().unwrap_or("-")
    )
}

fn result_detail(r: &TaskResult) -> String {
    let mut out = String::new();
    let command = if r.command.is_empty() { "-" } else { r.command.as_str() };
    out.push_str(&format!(
        "  {:<28} {:<8} {:>7} ms  {}\n",
        r.name,
        r.status.as_str(),
        r.duration_ms,
        command
    ));
    if let Some(msg) = &r.message {
        out.push_str(&format!("      note: {msg}\n"));
    }
    for (name, value) in &r.metrics {
        out.push_str(&format!("      {name} = {value}\n"));
    }
    for fact in &r.facts {
        out.push_str(&format!("      fact: {fact}\n"));
    }
    out
}

/// Plain-text summary: header, score, key facts, ranked highlights, category
/// breakdown, capture, then every result grouped by category.
pub fn render_text(doc: &ReportDocument) -> String {
    let mut out = String::new();

    out.push_str(&format!("{} {} diagnostic summary\n", doc.tool, doc.version));
    out.push_str(&format!("run:        {}\n", doc.run_id));
    out.push_str(&format!(
        "generated:  {}\n",
        doc.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("platform:   {}\n", doc.context.platform));
    out.push_str(&format!("interface:  {}\n", doc.context.interface));
    out.push_str(&format!("gateway:    {}\n", gateways(doc)));
    out.push_str(&format!("score:      {}\n", score_line(&doc.score)));

    if !doc.key_facts.is_empty() {
        out.push_str("\nKey facts\n");
        for line in key_fact_lines(&doc.key_facts) {
            out.push_str(&format!("  {line}\n"));
        }
    }

    out.push_str("\nHighlights\n");
    if doc.score.highlights.is_empty() {
        out.push_str(&format!("  {NO_ISSUES}\n"));
    } else {
        for (i, h) in doc.score.highlights.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, h));
        }
    }

    out.push_str("\nCategories\n");
    for c in &doc.score.categories {
        out.push_str(&format!("  {}\n", category_line(c)));
    }

    out.push_str("\nCapture\n");
    match &doc.capture {
        Some(cap) => {
            out.push_str(&format!("  filter: {}\n", cap.filter));
            out.push_str(&format!("  {}\n", capture_line(cap)));
        }
        None => out.push_str("  not captured\n"),
    }

    out.push_str("\nResults\n");
    for section in &doc.sections {
        out.push_str(&format!("[{}]\n", section.category));
        for r in &section.results {
            out.push_str(&result_detail(r));
        }
    }

    out
}

/// Markdown report with one collapsible block per category.
pub fn render_markdown(doc: &ReportDocument) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {} report\n\n", doc.tool));
    out.push_str(&format!(
        "**Generated:** {}</br>\n",
        doc.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("**Platform:** `{}`</br>\n", doc.context.platform));
    out.push_str(&format!("**Interface:** `{}`</br>\n", doc.context.interface));
    out.push_str(&format!("**Gateway:** {}</br>\n", gateways(doc)));
    out.push_str(&format!("**Score:** {}\n", score_line(&doc.score)));

    if !doc.key_facts.is_empty() {
        out.push_str("\n## Key facts\n\n");
        for f in &doc.key_facts.facts {
            out.push_str(&format!("**{}:** {}</br>\n", f.label, f.value));
        }
        if !doc.key_facts.warnings.is_empty() {
            out.push_str("\n```diff\n");
            for w in &doc.key_facts.warnings {
                out.push_str(&format!("- ! {w}\n"));
            }
            out.push_str("```\n");
        }
    }

    out.push_str("\n## Highlights\n\n");
    if doc.score.highlights.is_empty() {
        out.push_str(&format!("{NO_ISSUES}\n"));
    } else {
        for h in &doc.score.highlights {
            out.push_str(&format!(
                "- **{}** `{}`: {}\n",
                h.severity.as_str(),
                h.task,
                h.message
            ));
        }
    }
    if let Some(cap) = &doc.capture {
        out.push_str(&format!("\n{}\n", capture_line(cap)));
    }

    out.push_str("\n## Categories\n\n");
    out.push_str("| category | points | ok | failed | timeout | skipped | degraded |\n");
    out.push_str("|---|---|---|---|---|---|---|\n");
    for c in &doc.score.categories {
        let points = if c.active {
            format!("{}/{}", fmt_points(c.points), fmt_points(c.weight))
        } else {
            "n/a".to_string()
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            c.category, points, c.ok, c.failed, c.timeout, c.skipped, c.degraded
        ));
    }

    out.push_str("\n## Results\n");
    for section in &doc.sections {
        out.push_str(&format!(
            "\n<details>\n<summary>{} ({})</summary>\n",
            section.category,
            section.results.len()
        ));
        for r in &section.results {
            out.push_str("\n---\n");
            out.push_str(&format!("\n**Task:** `{}`</br>\n", r.name));
            if !r.command.is_empty() {
                out.push_str(&format!("**Command:** `{}`</br>\n", r.command));
            }
            match r.status {
                TaskStatus::Ok => out.push_str("**Status:** ok</br>\n"),
                status => {
                    let note = r.message.as_deref().unwrap_or("");
                    out.push_str(&format!("\n```diff\n- {status} {note}\n```\n"));
                }
            }
            if !r.facts.is_empty() {
                out.push_str(&format!("\n```\n{}\n```\n", r.facts.join("\n")));
            }
        }
        out.push_str("\n</details>\n");
    }

    out
}

/// Raw dump of one category: command, status and full output of each task.
pub fn render_raw(section: &CategorySection) -> String {
    let mut out = String::new();
    for r in &section.results {
        out.push_str(&format!("===== {} =====\n", r.name));
        out.push_str(&format!("Command: {}\n", r.command));
        out.push_str(&format!(
            "Status: {} (exit code {})\n",
            r.status,
            r.exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string())
        ));
        if let Some(msg) = &r.message {
            out.push_str(&format!("Message: {msg}\n"));
        }
        out.push_str(&format!("Started: {}\n", r.started_at.to_rfc3339()));
        out.push_str(&format!("Duration: {} ms\n", r.duration_ms));
        out.push_str("--- stdout ---\n");
        out.push_str(&r.stdout);
        if !r.stdout.ends_with('\n') {
            out.push('\n');
        }
        if !r.stderr.is_empty() {
            out.push_str("--- stderr ---\n");
            out.push_str(&r.stderr);
            if !r.stderr.ends_with('\n') {
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}
