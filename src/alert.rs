use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::engine::AnalyticsResult;

/// Comparison applied between the latest z-score and a rule's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
}

impl Operator {
    fn is_met(&self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Lt => value < threshold,
            Operator::Gte => value >= threshold,
            Operator::Lte => value <= threshold,
            Operator::Eq => value == threshold,
        }
    }
}

/// Caller-supplied fields for a new rule. `message` falls back to
/// `"{metric} {operator} {threshold}"` when absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSpec {
    pub symbol_x: String,
    pub symbol_y: String,
    pub metric: String,
    pub operator: Operator,
    pub threshold: f64,
    #[serde(default)]
    pub message: Option<String>,
}

/// A stored threshold rule. Owned exclusively by the registry; process
/// lifetime only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub id: u64,
    pub symbol_x: String,
    pub symbol_y: String,
    pub metric: String,
    pub operator: Operator,
    pub threshold: f64,
    pub message: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Ephemeral evaluation hit: the rule plus the z-score that fired it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTrigger {
    #[serde(flatten)]
    pub rule: AlertRule,
    pub current_value: f64,
}

/// Insertion-ordered rule registry with strictly increasing ids from 1.
/// Ids are never reused. Callers share it behind a mutex.
#[derive(Debug)]
pub struct AlertRegistry {
    rules: Vec<AlertRule>,
    next_id: u64,
}

impl Default for AlertRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, spec: AlertSpec) -> AlertRule {
        let message = spec.message.filter(|m| !m.trim().is_empty()).unwrap_or_else(|| {
            format!("{} {} {}", spec.metric, operator_label(spec.operator), spec.threshold)
        });
        let rule = AlertRule {
            id: self.next_id,
            symbol_x: spec.symbol_x.to_ascii_uppercase(),
            symbol_y: spec.symbol_y.to_ascii_uppercase(),
            metric: spec.metric,
            operator: spec.operator,
            threshold: spec.threshold,
            message,
            active: true,
            created_at: Utc::now(),
        };
        self.next_id += 1;
        self.rules.push(rule.clone());
        rule
    }

    /// Delete by id. Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: u64) {
        self.rules.retain(|rule| rule.id != id);
    }

    /// Snapshot copy in insertion order.
    pub fn list(&self) -> Vec<AlertRule> {
        self.rules.clone()
    }

    /// Fire every rule for this pair whose condition holds against the most
    /// recent z-score. An empty spread means no triggers. Evaluations are
    /// independent: there is no de-duplication or re-arm delay.
    pub fn evaluate(
        &self,
        result: &AnalyticsResult,
        symbol_x: &str,
        symbol_y: &str,
    ) -> Vec<AlertTrigger> {
        let Some(latest_z) = result.latest_z_score() else {
            return Vec::new();
        };
        let symbol_x = symbol_x.to_ascii_uppercase();
        let symbol_y = symbol_y.to_ascii_uppercase();

        self.rules
            .iter()
            .filter(|rule| rule.symbol_x == symbol_x && rule.symbol_y == symbol_y)
            .filter(|rule| rule.operator.is_met(latest_z, rule.threshold))
            .map(|rule| AlertTrigger {
                rule: rule.clone(),
                current_value: latest_z,
            })
            .collect()
    }
}

fn operator_label(op: Operator) -> &'static str {
    match op {
        Operator::Gt => "gt",
        Operator::Lt => "lt",
        Operator::Gte => "gte",
        Operator::Lte => "lte",
        Operator::Eq => "eq",
    }
}
