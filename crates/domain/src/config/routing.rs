use crate::model::TaskCategory;
use serde::{Deserialize, Serialize};

/// Router behavior and optional rule-table overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Utilization at or above which the router prefers a less loaded
    /// provider over the rule-preferred one.
    #[serde(default = "d_throttle_threshold")]
    pub throttle_threshold: f64,
    /// Rule overrides. Categories not listed here keep the built-in table.
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            throttle_threshold: d_throttle_threshold(),
            rules: Vec::new(),
        }
    }
}

fn d_throttle_threshold() -> f64 {
    0.8
}

/// One entry of the routing table: a preferred model plus its ordered
/// fallbacks for a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub category: TaskCategory,
    pub primary_model_id: String,
    /// Preference-ordered fallbacks tried when the primary is unusable.
    #[serde(default)]
    pub fallback_model_ids: Vec<String>,
    /// When any condition matches a request, the router re-resolves the
    /// request to this rule's category regardless of the classifier verdict.
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
}

impl RoutingRule {
    /// The full preference-ordered chain, primary first.
    pub fn model_chain(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_model_id.as_str())
            .chain(self.fallback_model_ids.iter().map(String::as_str))
    }
}

/// A metric-based claim condition attached to a routing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub metric: ConditionMetric,
    pub op: ConditionOp,
    pub value: u64,
}

impl RuleCondition {
    pub fn matches(&self, metric_value: u64) -> bool {
        match self.op {
            ConditionOp::Gt => metric_value > self.value,
            ConditionOp::Gte => metric_value >= self.value,
            ConditionOp::Lt => metric_value < self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionMetric {
    TokenCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOp {
    Gt,
    Gte,
    Lt,
}
