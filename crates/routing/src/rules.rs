//! The built-in routing table and its startup validation.

use std::collections::HashSet;
use sy_domain::config::{ConditionMetric, ConditionOp, RoutingRule, RuleCondition};
use sy_domain::model::TaskCategory;

fn rule(category: TaskCategory, primary: &str, fallbacks: &[&str]) -> RoutingRule {
    RoutingRule {
        category,
        primary_model_id: primary.to_string(),
        fallback_model_ids: fallbacks.iter().map(|s| s.to_string()).collect(),
        conditions: Vec::new(),
    }
}

/// The default routing table, one rule per task category.
pub fn default_rules() -> Vec<RoutingRule> {
    let mut rules = vec![
        rule(
            TaskCategory::Simple,
            "cerebras-llama-4-scout-17b",
            &[
                "cerebras-llama-3.3-70b",
                "groq-llama-3.2-3b",
                "gemini-2.5-flash",
            ],
        ),
        rule(
            TaskCategory::Medium,
            "cerebras-llama-3.3-70b",
            &[
                "cerebras-gpt-oss-120b",
                "gemini-2.5-flash",
                "groq-mistral-saba-24b",
            ],
        ),
        rule(
            TaskCategory::Complex,
            "cerebras-gpt-oss-120b",
            &[
                "gemini-2.5-pro",
                "cerebras-llama-3.3-70b",
                "gemini-3-pro-preview",
            ],
        ),
        rule(
            TaskCategory::Coding,
            "cerebras-deepseek-v3-0324",
            &[
                "cerebras-gpt-oss-120b",
                "gemini-2.5-pro",
                "cerebras-llama-3.3-70b",
            ],
        ),
        rule(
            TaskCategory::Reasoning,
            "cerebras-gpt-oss-120b",
            &[
                "gemini-2.5-pro",
                "gemini-3-pro-preview",
                "cerebras-llama-3.3-70b",
            ],
        ),
        rule(
            TaskCategory::VisionIn,
            "gemini-3-pro-preview",
            &["gemini-2.5-pro", "gemini-2.5-flash"],
        ),
        rule(TaskCategory::ImageGen, "imagen-4.0", &["gemini-3-pro-preview"]),
        rule(TaskCategory::VideoGen, "veo-3.1", &[]),
        rule(
            TaskCategory::Multilingual,
            "groq-mistral-saba-24b",
            &[
                "gemini-2.5-pro",
                "cerebras-llama-3.3-70b",
                "gemini-3-pro-preview",
            ],
        ),
        rule(
            TaskCategory::Agentic,
            "gemini-3-pro-preview",
            &["gemini-2.5-pro", "cerebras-gpt-oss-120b"],
        ),
        rule(
            TaskCategory::LongContext,
            "gemini-2.5-flash",
            &["gemini-2.5-pro", "gemini-3-pro-preview"],
        ),
    ];

    // Requests over 100k estimated tokens route as LONG_CONTEXT no matter
    // what the classifier said.
    if let Some(long) = rules
        .iter_mut()
        .find(|r| r.category == TaskCategory::LongContext)
    {
        long.conditions.push(RuleCondition {
            metric: ConditionMetric::TokenCount,
            op: ConditionOp::Gt,
            value: 100_000,
        });
    }
    rules
}

/// Problems found while cross-checking a rule table against the registry.
#[derive(Debug, Clone, Default)]
pub struct RulesValidation {
    /// `(category, model_id)` pairs naming ids the registry does not have.
    pub unknown_model_ids: Vec<(TaskCategory, String)>,
    /// Categories with no rule at all.
    pub missing_categories: Vec<TaskCategory>,
}

impl RulesValidation {
    pub fn is_clean(&self) -> bool {
        self.unknown_model_ids.is_empty() && self.missing_categories.is_empty()
    }
}

/// Cross-check a rule table against the set of known model ids.
pub fn validate_rules(rules: &[RoutingRule], valid_ids: &HashSet<String>) -> RulesValidation {
    let mut out = RulesValidation::default();
    for rule in rules {
        for id in rule.model_chain() {
            if !valid_ids.contains(id) {
                out.unknown_model_ids.push((rule.category, id.to_string()));
            }
        }
    }
    for category in TaskCategory::ALL {
        if !rules.iter().any(|r| r.category == category) {
            out.missing_categories.push(category);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sy_registry::catalog::default_catalog;

    #[test]
    fn default_rules_cover_all_categories_with_known_models() {
        let ids: HashSet<String> = default_catalog().into_iter().map(|m| m.id).collect();
        let validation = validate_rules(&default_rules(), &ids);
        assert!(
            validation.is_clean(),
            "rule table out of sync with catalog: {validation:?}"
        );
    }

    #[test]
    fn long_context_rule_claims_oversized_requests() {
        let rules = default_rules();
        let long = rules
            .iter()
            .find(|r| r.category == TaskCategory::LongContext)
            .unwrap();
        assert_eq!(long.conditions.len(), 1);
        assert!(long.conditions[0].matches(100_001));
        assert!(!long.conditions[0].matches(100_000));
    }

    #[test]
    fn validation_reports_unknown_ids() {
        let ids: HashSet<String> = ["a".to_string()].into_iter().collect();
        let rules = vec![RoutingRule {
            category: TaskCategory::Simple,
            primary_model_id: "a".into(),
            fallback_model_ids: vec!["ghost".into()],
            conditions: Vec::new(),
        }];
        let validation = validate_rules(&rules, &ids);
        assert_eq!(
            validation.unknown_model_ids,
            vec![(TaskCategory::Simple, "ghost".to_string())]
        );
        assert_eq!(validation.missing_categories.len(), 10);
    }
}
