use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScoreError;
use crate::executor::types::{Category, TaskResult, TaskSpec, TaskStatus};
use crate::store::FrozenResults;

use super::policy::{CategoryRule, ScoringPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The task failed or timed out.
    Critical,
    /// The task ran but a metric crossed its threshold.
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Highlight {
    pub severity: Severity,
    pub category: Category,
    pub task: String,
    pub message: String,
}

impl fmt::Display for Highlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity.as_str(), self.task, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub points: f64,
    pub weight: f64,
    /// False when every member was skipped; such a category is left out of
    /// the overall score.
    pub active: bool,
    pub ok: usize,
    pub failed: usize,
    pub timeout: usize,
    pub skipped: usize,
    /// `ok` results with at least one threshold crossing.
    pub degraded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score: f64,
    pub max_score: f64,
    /// `ok` results among the non-skipped ones.
    pub passed: usize,
    pub total: usize,
    pub categories: Vec<CategoryScore>,
    /// Ranked by severity, then category, then task name.
    pub highlights: Vec<Highlight>,
}

impl ScoreReport {
    pub fn highlight_lines(&self) -> Vec<String> {
        self.highlights.iter().map(ToString::to_string).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.highlights.is_empty()
    }
}

/// Category membership for one run, fixed before collection starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    policy: ScoringPolicy,
    members: BTreeMap<Category, BTreeSet<String>>,
}

impl ScoreTable {
    /// Table for the specs a run selected.
    pub fn build(policy: &ScoringPolicy, specs: &[TaskSpec]) -> Self {
        let mut members: BTreeMap<Category, BTreeSet<String>> = BTreeMap::new();
        for spec in specs {
            members
                .entry(spec.category)
                .or_default()
                .insert(spec.name.clone());
        }
        Self {
            policy: policy.clone(),
            members,
        }
    }

    /// Table whose membership is read back from the results themselves.
    pub fn from_results(policy: &ScoringPolicy, store: &FrozenResults) -> Self {
        let mut members: BTreeMap<Category, BTreeSet<String>> = BTreeMap::new();
        for r in store.iter() {
            members.entry(r.category).or_default().insert(r.name.clone());
        }
        Self {
            policy: policy.clone(),
            members,
        }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn members(&self, category: Category) -> impl Iterator<Item = &str> {
        self.members
            .get(&category)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    fn contains(&self, category: Category, name: &str) -> bool {
        self.members
            .get(&category)
            .is_some_and(|names| names.contains(name))
    }
}

/// A table/store mismatch is a wiring bug: loud in debug builds, an error otherwise.
fn inconsistency(err: ScoreError) -> ScoreError {
    debug_assert!(false, "scoring rule references an inconsistent task set: {err}");
    tracing::error!(error = %err, "scoring inconsistency");
    err
}

/// Score a frozen store. Pure: the same store and table always give the same report.
pub fn score(store: &FrozenResults, table: &ScoreTable) -> Result<ScoreReport, ScoreError> {
    for (category, names) in &table.members {
        for name in names {
            match store.get(name) {
                Some(r) if r.category == *category => {}
                _ => {
                    return Err(inconsistency(ScoreError::MissingResult {
                        category: category.to_string(),
                        task: name.clone(),
                    }))
                }
            }
        }
    }
    if let Some(r) = store.iter().find(|r| !table.contains(r.category, &r.name)) {
        return Err(inconsistency(ScoreError::UnscoredResult(r.name.clone())));
    }

    let policy = table.policy();
    let mut categories = Vec::new();
    let mut highlights = Vec::new();
    let (mut passed, mut total) = (0, 0);
    let (mut earned, mut possible) = (0.0_f64, 0.0_f64);

    for (category, names) in &table.members {
        let rule = policy.rule(*category).copied().unwrap_or(CategoryRule::new(0.0, 0.0, 0.0, 0.0));
        let results = names.iter().filter_map(|n| store.get(n));
        let cat = fold_category(*category, &rule, policy, results, &mut highlights);

        passed += cat.ok;
        total += cat.ok + cat.failed + cat.timeout;
        if cat.active && rule.weight > 0.0 {
            earned += cat.points;
            possible += rule.weight;
        }
        categories.push(cat);
    }

    let score = if possible > 0.0 {
        round1(earned / possible * policy.max_score)
    } else {
        policy.max_score
    };

    highlights.sort();

    Ok(ScoreReport {
        score,
        max_score: policy.max_score,
        passed,
        total,
        categories,
        highlights,
    })
}

fn fold_category<'a>(
    category: Category,
    rule: &CategoryRule,
    policy: &ScoringPolicy,
    results: impl Iterator<Item = &'a TaskResult>,
    highlights: &mut Vec<Highlight>,
) -> CategoryScore {
    let mut cat = CategoryScore {
        category,
        points: rule.weight,
        weight: rule.weight,
        active: false,
        ok: 0,
        failed: 0,
        timeout: 0,
        skipped: 0,
        degraded: 0,
    };

    for r in results {
        let mut flag = |severity, message: String| {
            highlights.push(Highlight {
                severity,
                category,
                task: r.name.clone(),
                message,
            })
        };

        match r.status {
            TaskStatus::Skipped => cat.skipped += 1,
            TaskStatus::Ok => {
                cat.ok += 1;
                let violations: Vec<String> = policy
                    .thresholds
                    .iter()
                    .filter_map(|t| r.metrics.get(&t.metric).and_then(|v| t.violation(*v)))
                    .collect();
                if !violations.is_empty() {
                    cat.degraded += 1;
                    cat.points -= rule.degraded_penalty;
                    flag(Severity::Warning, violations.join(", "));
                }
            }
            TaskStatus::Failed => {
                cat.failed += 1;
                cat.points -= rule.failed_penalty;
                flag(Severity::Critical, failure_message(r));
            }
            TaskStatus::Timeout => {
                cat.timeout += 1;
                cat.points -= rule.timeout_penalty;
                let msg = match &r.message {
                    Some(m) => format!("timed out ({m})"),
                    None => "timed out".to_string(),
                };
                flag(Severity::Critical, msg);
            }
        }
    }

    cat.active = cat.ok + cat.failed + cat.timeout > 0;
    cat.points = cat.points.clamp(0.0, rule.weight.max(0.0));
    cat
}

fn failure_message(r: &TaskResult) -> String {
    match (r.exit_code, &r.message) {
        (Some(code), _) => format!("failed with exit code {code}"),
        (None, Some(m)) => format!("failed: {m}"),
        (None, None) => "failed".to_string(),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
