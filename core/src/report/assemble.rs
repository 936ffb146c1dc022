use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::Context;
use crate::executor::types::{Category, TaskResult};
use crate::scoring::ScoreReport;
use crate::store::FrozenResults;

use super::key_facts::KeyFacts;
use super::render;

/// Line marker tcpdump prints for an ICMPv6 router advertisement.
const ROUTER_ADVERTISEMENT: &str = "router advertisement";

/// What the packet-capture collaborator observed during collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub filter: String,
    pub router_advertisements: usize,
    /// Decoded capture lines, as printed by the capture tool.
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureSummary {
    /// Summarise `tcpdump -r` output read back with `filter`.
    pub fn from_text(filter: impl Into<String>, raw: &str) -> Self {
        let lines: Vec<String> = raw
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        let router_advertisements = lines
            .iter()
            .filter(|l| l.contains(ROUTER_ADVERTISEMENT))
            .count();
        Self {
            filter: filter.into(),
            router_advertisements,
            lines,
            error: None,
        }
    }

    pub fn failed(filter: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            router_advertisements: 0,
            lines: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Every result of one category, sorted by task name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySection {
    pub category: Category,
    pub results: Vec<TaskResult>,
}

/// Machine-readable report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub tool: String,
    pub version: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub context: Context,
    pub score: ScoreReport,
    #[serde(default)]
    pub key_facts: KeyFacts,
    pub sections: Vec<CategorySection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureSummary>,
}

impl ReportDocument {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn results(&self) -> impl Iterator<Item = &TaskResult> {
        self.sections.iter().flat_map(|s| s.results.iter())
    }

    pub fn section(&self, category: Category) -> Option<&CategorySection> {
        self.sections.iter().find(|s| s.category == category)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub document: ReportDocument,
    /// Rendered plain-text summary.
    pub summary: String,
}

impl Report {
    pub fn markdown(&self) -> String {
        render::render_markdown(&self.document)
    }

    pub fn highlights(&self) -> String {
        render::render_highlights(&self.document)
    }
}

pub fn assemble(store: &FrozenResults, score: &ScoreReport, ctx: &Context) -> Report {
    assemble_with_capture(store, score, ctx, None)
}

pub fn assemble_with_capture(
    store: &FrozenResults,
    score: &ScoreReport,
    ctx: &Context,
    capture: Option<CaptureSummary>,
) -> Report {
    // FrozenResults iterates by name, so each section is already sorted.
    let sections = store
        .by_category()
        .into_iter()
        .map(|(category, results)| CategorySection {
            category,
            results: results.into_iter().cloned().collect(),
        })
        .collect();
    let key_facts = KeyFacts::gather(ctx.platform, store, capture.as_ref());

    let document = ReportDocument {
        tool: crate::TOOL_NAME.to_string(),
        version: crate::VERSION.to_string(),
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        context: ctx.clone(),
        score: score.clone(),
        key_facts,
        sections,
        capture,
    };
    let summary = render::render_text(&document);

    Report { document, summary }
}
