use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::executor::types::Category;
use crate::metrics;

/// Points a category is worth and what each kind of problem costs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub weight: f64,
    pub failed_penalty: f64,
    pub timeout_penalty: f64,
    /// Charged once per `ok` result with at least one threshold crossing.
    pub degraded_penalty: f64,
}

impl CategoryRule {
    pub const fn new(weight: f64, failed: f64, timeout: f64, degraded: f64) -> Self {
        Self {
            weight,
            failed_penalty: failed,
            timeout_penalty: timeout,
            degraded_penalty: degraded,
        }
    }
}

/// Acceptable range for one parsed metric. Either bound may be open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Human name used in highlights, defaults to the metric name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl MetricThreshold {
    pub fn at_most(metric: &str, max: f64, label: &str) -> Self {
        Self {
            metric: metric.to_string(),
            min: None,
            max: Some(max),
            label: Some(label.to_string()),
        }
    }

    pub fn at_least(metric: &str, min: f64, label: &str) -> Self {
        Self {
            metric: metric.to_string(),
            min: Some(min),
            max: None,
            label: Some(label.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.metric)
    }

    /// Describe how `value` falls outside the range, `None` when it is fine.
    pub fn violation(&self, value: f64) -> Option<String> {
        if let Some(min) = self.min {
            if value < min {
                return Some(format!("{} {} below {}", self.label(), fmt_num(value), fmt_num(min)));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Some(format!("{} {} above {}", self.label(), fmt_num(value), fmt_num(max)));
            }
        }
        None
    }
}

pub(crate) fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}

/// Weighted rule table the scorer folds results through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub max_score: f64,
    pub categories: BTreeMap<Category, CategoryRule>,
    pub thresholds: Vec<MetricThreshold>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        let categories = BTreeMap::from([
            (Category::Connectivity, CategoryRule::new(30.0, 10.0, 10.0, 4.0)),
            (Category::Dns, CategoryRule::new(20.0, 10.0, 10.0, 4.0)),
            (Category::Latency, CategoryRule::new(20.0, 8.0, 8.0, 4.0)),
            (Category::LinkQuality, CategoryRule::new(20.0, 10.0, 10.0, 5.0)),
            (Category::System, CategoryRule::new(10.0, 2.0, 2.0, 1.0)),
        ]);
        let thresholds = vec![
            MetricThreshold::at_most(metrics::PACKET_LOSS_PCT, 0.0, "packet loss %"),
            MetricThreshold::at_most(metrics::RTT_AVG_MS, 100.0, "average RTT ms"),
            MetricThreshold::at_most(metrics::HTTP_STATUS, 399.0, "HTTP status"),
            MetricThreshold::at_least(metrics::RESOLVED_ADDRESSES, 1.0, "resolved addresses"),
            MetricThreshold::at_least(metrics::RSSI_DBM, -70.0, "RSSI dBm"),
            MetricThreshold::at_least(metrics::LINK_QUALITY_PCT, 50.0, "link quality %"),
            MetricThreshold::at_most(metrics::RETRANSMIT_PCT, 2.0, "TCP retransmit %"),
        ];
        Self {
            max_score: 100.0,
            categories,
            thresholds,
        }
    }
}

impl ScoringPolicy {
    /// Checked once at configuration load.
    ///
    /// Failure penalties must not be smaller than the degraded penalty, so
    /// turning any result into a failure can never raise the score.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_score.is_finite() && self.max_score > 0.0) {
            return Err(ConfigError::InvalidPolicy(format!(
                "max_score must be positive, got {}",
                self.max_score
            )));
        }
        for category in Category::ALL {
            if !self.categories.contains_key(&category) {
                return Err(ConfigError::InvalidPolicy(format!(
                    "no rule for category '{category}'"
                )));
            }
        }
        for (category, rule) in &self.categories {
            let values = [
                rule.weight,
                rule.failed_penalty,
                rule.timeout_penalty,
                rule.degraded_penalty,
            ];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ConfigError::InvalidPolicy(format!(
                    "category '{category}' has a non-finite value"
                )));
            }
            if rule.weight <= 0.0 {
                return Err(ConfigError::InvalidPolicy(format!(
                    "category '{category}' weight must be positive"
                )));
            }
            if values[1..].iter().any(|v| *v < 0.0) {
                return Err(ConfigError::InvalidPolicy(format!(
                    "category '{category}' penalties must not be negative"
                )));
            }
            if rule.failed_penalty < rule.degraded_penalty
                || rule.timeout_penalty < rule.degraded_penalty
            {
                return Err(ConfigError::InvalidPolicy(format!(
                    "category '{category}' failed/timeout penalties must be at least the degraded penalty"
                )));
            }
        }
        for t in &self.thresholds {
            if t.metric.trim().is_empty() {
                return Err(ConfigError::InvalidPolicy("threshold without metric".into()));
            }
            match (t.min, t.max) {
                (None, None) => {
                    return Err(ConfigError::InvalidPolicy(format!(
                        "threshold '{}' needs a min or a max",
                        t.metric
                    )))
                }
                (Some(min), Some(max)) if min > max => {
                    return Err(ConfigError::InvalidPolicy(format!(
                        "threshold '{}' has min {min} above max {max}",
                        t.metric
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn rule(&self, category: Category) -> Option<&CategoryRule> {
        self.categories.get(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        ScoringPolicy::default().validate().unwrap();
    }

    #[test]
    fn rejects_policies_that_break_monotonicity() {
        let mut p = ScoringPolicy::default();
        p.categories
            .insert(Category::Dns, CategoryRule::new(20.0, 2.0, 10.0, 4.0));
        assert!(matches!(p.validate(), Err(ConfigError::InvalidPolicy(_))));
    }

    #[test]
    fn rejects_bad_thresholds_and_weights() {
        let mut p = ScoringPolicy::default();
        p.thresholds.push(MetricThreshold {
            metric: "rssi_dbm".into(),
            min: Some(-50.0),
            max: Some(-60.0),
            label: None,
        });
        assert!(p.validate().is_err());

        let mut p = ScoringPolicy::default();
        p.categories
            .insert(Category::System, CategoryRule::new(0.0, 0.0, 0.0, 0.0));
        assert!(p.validate().is_err());

        let mut p = ScoringPolicy::default();
        p.categories.remove(&Category::LinkQuality);
        assert!(p.validate().is_err());
    }

    #[test]
    fn threshold_describes_violation() {
        let t = MetricThreshold::at_least("rssi_dbm", -70.0, "RSSI dBm");
        assert_eq!(t.violation(-60.0), None);
        assert_eq!(t.violation(-78.0).as_deref(), Some("RSSI dBm -78 below -70"));

        let t = MetricThreshold::at_most("rtt_avg_ms", 100.0, "average RTT ms");
        assert_eq!(t.violation(123.456).as_deref(), Some("average RTT ms 123.46 above 100"));
    }

    #[test]
    fn partial_toml_policy_keeps_defaults() {
        let p: ScoringPolicy = toml::from_str("max_score = 10.0").unwrap();
        assert_eq!(p.max_score, 10.0);
        assert_eq!(p.categories.len(), 5);
        assert_eq!(p.thresholds.len(), 7);
    }
}
