//! Scorer: folds a frozen result store through a weighted rule table into
//! one bounded score, per-category sub-scores and ranked highlights.
mod policy;
mod score;

pub use policy::{CategoryRule, MetricThreshold, ScoringPolicy};
pub use score::{score, CategoryScore, Highlight, ScoreReport, ScoreTable, Severity};
