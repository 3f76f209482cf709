//! Utilization-aware model selection over the routing-rule table.
//!
//! Routing is snapshot-based: it reads registry and limiter state, never
//! calls a backend, and holds no lock across the whole decision.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use sy_admission::RateLimiter;
use sy_domain::config::{ConditionMetric, RoutingConfig, RoutingRule};
use sy_domain::model::{
    Complexity, HealthStatus, LifecycleStatus, ModelDescriptor, TaskCategory,
};
use sy_domain::request::RoutingRequest;
use sy_domain::trace::TraceEvent;
use sy_domain::{Error, Result};
use sy_registry::ModelRegistry;

use crate::rules::default_rules;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Decision and statistics types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The outcome of one routing decision.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub selected_model: ModelDescriptor,
    /// Availability-filtered remainder of the chain, priority-descending.
    pub fallback_chain: Vec<ModelDescriptor>,
    pub routing_reason: String,
    pub estimated_latency_ms: u64,
    /// Final category after condition-based rerouting.
    pub category: TaskCategory,
    pub routed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RoutingStats {
    pub total_requests: u64,
    /// Decisions where the rule primary was not selected.
    pub fallback_requests: u64,
    pub category_counts: HashMap<TaskCategory, u64>,
    pub provider_counts: HashMap<String, u64>,
    pub average_decision_micros: f64,
}

impl RoutingStats {
    pub fn fallback_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.fallback_requests as f64 / self.total_requests as f64
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct IntelligentRouter {
    registry: Arc<ModelRegistry>,
    limiter: Arc<RateLimiter>,
    rules: RwLock<HashMap<TaskCategory, RoutingRule>>,
    throttle_threshold: f64,
    stats: Mutex<RoutingStats>,
}

impl IntelligentRouter {
    /// Build from the default table with config overrides applied on top.
    pub fn new(
        registry: Arc<ModelRegistry>,
        limiter: Arc<RateLimiter>,
        cfg: &RoutingConfig,
    ) -> Self {
        let mut rules: HashMap<TaskCategory, RoutingRule> = default_rules()
            .into_iter()
            .map(|r| (r.category, r))
            .collect();
        for rule in &cfg.rules {
            rules.insert(rule.category, rule.clone());
        }
        Self {
            registry,
            limiter,
            rules: RwLock::new(rules),
            throttle_threshold: cfg.throttle_threshold,
            stats: Mutex::new(RoutingStats::default()),
        }
    }

    /// Pick a model and fallback chain for a classified request.
    pub fn route(&self, request: &RoutingRequest) -> Result<RoutingDecision> {
        let started = Instant::now();
        let classification = &request.classification;
        let tokens = classification.estimated_tokens;

        // Condition scan: another rule may claim this request outright.
        let mut category = classification.category;
        {
            let rules = self.rules.read();
            'scan: for rule in rules.values() {
                if rule.category == category {
                    continue;
                }
                for cond in &rule.conditions {
                    let metric_value = match cond.metric {
                        ConditionMetric::TokenCount => tokens,
                    };
                    if cond.matches(metric_value) {
                        tracing::debug!(
                            from = %category,
                            to = %rule.category,
                            tokens,
                            "rule condition rerouted request"
                        );
                        category = rule.category;
                        break 'scan;
                    }
                }
            }
        }

        let mut selection = self.select_for(category, tokens);
        if selection.is_none() {
            // Category exhausted: one retry against the rule with the
            // broadest fallback list before giving up.
            if let Some(broadest) = self.broadest_category() {
                if broadest != category {
                    tracing::warn!(
                        category = %category,
                        retry = %broadest,
                        "category exhausted; retrying with broadest rule"
                    );
                    selection = self.select_for(broadest, tokens);
                    if selection.is_some() {
                        category = broadest;
                    }
                }
            }
        }
        let Some((selected, fallback_chain, routing_reason, was_fallback)) = selection else {
            return Err(Error::NoAvailableModels {
                category: category.to_string(),
            });
        };

        let estimated_latency_ms =
            estimate_latency(&selected.provider, classification.estimated_complexity, tokens);

        TraceEvent::RouteSelected {
            category: category.to_string(),
            model: selected.id.clone(),
            provider: selected.provider.clone(),
            fallback_count: fallback_chain.len(),
            reason: routing_reason.clone(),
        }
        .emit();

        self.fold_stats(category, &selected.provider, was_fallback, started);

        Ok(RoutingDecision {
            selected_model: selected,
            fallback_chain,
            routing_reason,
            estimated_latency_ms,
            category,
            routed_at: Utc::now(),
        })
    }

    /// Try to satisfy one category. None when every candidate is gone.
    /// Returns (selection, fallback chain, reason, primary-was-replaced).
    fn select_for(
        &self,
        category: TaskCategory,
        tokens: u64,
    ) -> Option<(ModelDescriptor, Vec<ModelDescriptor>, String, bool)> {
        let rule = self.rules.read().get(&category)?.clone();

        // Resolve and lifecycle-filter the chain, preserving rule order.
        let candidates: Vec<ModelDescriptor> = rule
            .model_chain()
            .filter_map(|id| self.registry.get(id))
            .filter(routable)
            .collect();

        // Drop candidates that are rate-blocked with nowhere to queue.
        let usable: Vec<&ModelDescriptor> = candidates
            .iter()
            .filter(|m| {
                self.limiter.can_execute(&m.provider, tokens)
                    || self.limiter.utilization(&m.provider) < self.throttle_threshold
                    || !self.limiter.queue_is_full(&m.provider)
            })
            .collect();
        if usable.is_empty() {
            return None;
        }

        let primary_routable = candidates
            .iter()
            .any(|m| m.id == rule.primary_model_id);

        let selected: ModelDescriptor;
        let reason: String;
        if usable[0].id == rule.primary_model_id
            && self.limiter.can_execute(&usable[0].provider, tokens)
        {
            selected = usable[0].clone();
            let utilization = self.limiter.utilization(&selected.provider);
            reason = if utilization > 0.5 {
                format!(
                    "primary choice for {category} ({} at {:.0}% utilization)",
                    selected.provider,
                    utilization * 100.0
                )
            } else {
                format!("primary choice for {category}")
            };
        } else {
            // Score: admission first, then headroom, then priority.
            // Stable: earlier chain position wins ties.
            let mut best = usable[0];
            let mut best_score = self.score(best, tokens);
            for &m in &usable[1..] {
                let s = self.score(m, tokens);
                if s > best_score {
                    best = m;
                    best_score = s;
                }
            }
            selected = best.clone();
            if primary_routable {
                let utilization = self.limiter.utilization(
                    &candidates
                        .iter()
                        .find(|m| m.id == rule.primary_model_id)
                        .map(|m| m.provider.clone())
                        .unwrap_or_default(),
                );
                reason = format!(
                    "primary {} rate-limited at {:.0}% utilization; selected {}",
                    rule.primary_model_id,
                    utilization * 100.0,
                    selected.id
                );
            } else {
                reason = format!(
                    "primary {} unavailable; selected fallback {}",
                    rule.primary_model_id, selected.id
                );
            }
        }

        let was_fallback = selected.id != rule.primary_model_id;
        let mut chain: Vec<ModelDescriptor> = candidates
            .into_iter()
            .filter(|m| m.id != selected.id)
            .collect();
        chain.sort_by(|a, b| b.priority.cmp(&a.priority));

        Some((selected, chain, reason, was_fallback))
    }

    fn score(&self, model: &ModelDescriptor, tokens: u64) -> f64 {
        let mut score = 0.0;
        if self.limiter.can_execute(&model.provider, tokens) {
            score += 1_000.0;
        }
        score += (1.0 - self.limiter.utilization(&model.provider)) * 100.0;
        score += f64::from(model.priority);
        score
    }

    /// The category whose rule lists the most fallbacks.
    fn broadest_category(&self) -> Option<TaskCategory> {
        let rules = self.rules.read();
        let mut best: Option<(&RoutingRule, usize)> = None;
        for rule in rules.values() {
            let breadth = rule.fallback_model_ids.len();
            match best {
                Some((_, b)) if breadth <= b => {}
                _ => best = Some((rule, breadth)),
            }
        }
        best.map(|(r, _)| r.category)
    }

    fn fold_stats(
        &self,
        category: TaskCategory,
        provider: &str,
        was_fallback: bool,
        started: Instant,
    ) {
        let elapsed = started.elapsed().as_micros() as f64;
        let mut stats = self.stats.lock();
        let n = stats.total_requests as f64;
        stats.average_decision_micros =
            (stats.average_decision_micros * n + elapsed) / (n + 1.0);
        stats.total_requests += 1;
        if was_fallback {
            stats.fallback_requests += 1;
        }
        *stats.category_counts.entry(category).or_default() += 1;
        *stats.provider_counts.entry(provider.to_string()).or_default() += 1;
    }

    // ── rule and stats surface ──

    /// Replace rules for the categories listed; others keep their entry.
    pub fn update_rules(&self, rules: Vec<RoutingRule>) {
        let mut table = self.rules.write();
        for rule in rules {
            table.insert(rule.category, rule);
        }
    }

    pub fn rule_for(&self, category: TaskCategory) -> Option<RoutingRule> {
        self.rules.read().get(&category).cloned()
    }

    pub fn stats(&self) -> RoutingStats {
        self.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = RoutingStats::default();
    }
}

/// Whether a model may appear in a routing decision at all. DYING models
/// still route; DEAD, disabled, and UNAVAILABLE ones never do.
fn routable(model: &ModelDescriptor) -> bool {
    model.enabled
        && model.lifecycle.status != LifecycleStatus::Dead
        && model.lifecycle.health_status != HealthStatus::Unavailable
}

fn estimate_latency(provider: &str, complexity: Complexity, tokens: u64) -> u64 {
    let base: f64 = match provider {
        "groq" => 500.0,
        "cerebras" => 600.0,
        "google" => 1_200.0,
        "huggingface" => 2_000.0,
        "elevenlabs" => 1_500.0,
        _ => 1_000.0,
    };
    let multiplier = match complexity {
        Complexity::Low => 1.0,
        Complexity::Medium => 1.5,
        Complexity::High => 2.5,
    };
    let token_factor = 1.0 + (tokens as f64 / 1_000.0).min(3.0) * 0.2;
    (base * multiplier * token_factor) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sy_domain::config::LimitsConfig;
    use sy_domain::request::Classification;
    use sy_registry::catalog::default_catalog;

    fn make_router() -> (Arc<ModelRegistry>, Arc<RateLimiter>, IntelligentRouter) {
        let registry = Arc::new(ModelRegistry::new(default_catalog()).unwrap());
        let limiter = Arc::new(RateLimiter::new(&LimitsConfig::default()));
        let router = IntelligentRouter::new(
            Arc::clone(&registry),
            Arc::clone(&limiter),
            &RoutingConfig::default(),
        );
        (registry, limiter, router)
    }

    fn make_request(category: TaskCategory, tokens: u64) -> RoutingRequest {
        RoutingRequest {
            classification: Classification {
                category,
                confidence: 0.9,
                reasoning: "test".into(),
                estimated_complexity: Complexity::Medium,
                estimated_tokens: tokens,
                requires_multimodal: false,
                detected_language: "en".into(),
                classified_at: Utc::now(),
                classifier_model: "fallback-rules".into(),
            },
            user_message: "test".into(),
            conversation_history: Vec::new(),
        }
    }

    #[test]
    fn coding_routes_to_configured_primary() {
        let (_, _, router) = make_router();
        let decision = router.route(&make_request(TaskCategory::Coding, 500)).unwrap();
        assert_eq!(decision.selected_model.id, "cerebras-deepseek-v3-0324");
        assert!(decision.routing_reason.contains("primary choice"));
        assert_eq!(decision.fallback_chain.len(), 3);
    }

    #[test]
    fn dead_primary_falls_to_first_healthy_fallback() {
        let (registry, _, router) = make_router();
        registry.mark_dead("cerebras-deepseek-v3-0324", None);

        let decision = router.route(&make_request(TaskCategory::Coding, 500)).unwrap();
        assert_ne!(decision.selected_model.id, "cerebras-deepseek-v3-0324");
        assert!(decision.routing_reason.contains("unavailable"));
    }

    #[test]
    fn oversized_requests_reroute_to_long_context() {
        let (_, _, router) = make_router();
        let decision = router
            .route(&make_request(TaskCategory::Simple, 150_000))
            .unwrap();
        assert_eq!(decision.category, TaskCategory::LongContext);
        assert_eq!(decision.selected_model.id, "gemini-2.5-flash");
    }

    #[test]
    fn rate_limited_primary_notes_utilization() {
        let (_, limiter, router) = make_router();
        // Exhaust cerebras' minute budget.
        for _ in 0..100 {
            limiter.record_request("cerebras", 0);
        }
        let decision = router.route(&make_request(TaskCategory::Coding, 500)).unwrap();
        assert_ne!(decision.selected_model.provider, "cerebras");
        assert!(decision.routing_reason.contains("rate-limited"));
        assert!(decision.routing_reason.contains('%'));
    }

    #[test]
    fn exhausted_category_returns_no_available_models() {
        let (registry, _, router) = make_router();
        for model in registry.active_models() {
            registry.mark_dead(&model.id, None);
        }
        let err = router
            .route(&make_request(TaskCategory::VideoGen, 500))
            .unwrap_err();
        assert!(matches!(err, Error::NoAvailableModels { .. }));
    }

    #[test]
    fn exhausted_category_retries_broadest_rule_first() {
        let (registry, _, router) = make_router();
        registry.mark_dead("veo-3.1", None);

        // VIDEO_GEN has no fallbacks, but the broadest rule still has
        // healthy models, so routing succeeds with a substituted category.
        let decision = router.route(&make_request(TaskCategory::VideoGen, 500)).unwrap();
        assert_ne!(decision.category, TaskCategory::VideoGen);
    }

    #[test]
    fn latency_estimate_scales_with_complexity_and_tokens() {
        // google base 1200, HIGH 2.5x, token factor capped at 1.6.
        assert_eq!(
            estimate_latency("google", Complexity::High, 10_000),
            (1_200.0_f64 * 2.5 * 1.6) as u64
        );
        assert_eq!(estimate_latency("groq", Complexity::Low, 0), 500);
    }

    #[test]
    fn stats_track_fallbacks_and_categories() {
        let (registry, _, router) = make_router();
        router.route(&make_request(TaskCategory::Coding, 500)).unwrap();
        registry.mark_dead("cerebras-deepseek-v3-0324", None);
        router.route(&make_request(TaskCategory::Coding, 500)).unwrap();

        let stats = router.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.fallback_requests, 1);
        assert_eq!(stats.category_counts[&TaskCategory::Coding], 2);
        assert!((stats.fallback_rate() - 0.5).abs() < f64::EPSILON);

        router.reset_stats();
        assert_eq!(router.stats().total_requests, 0);
    }

    #[test]
    fn update_rules_replaces_single_category() {
        let (_, _, router) = make_router();
        router.update_rules(vec![RoutingRule {
            category: TaskCategory::Coding,
            primary_model_id: "gemini-2.5-pro".into(),
            fallback_model_ids: vec!["cerebras-gpt-oss-120b".into()],
            conditions: Vec::new(),
        }]);

        let decision = router.route(&make_request(TaskCategory::Coding, 500)).unwrap();
        assert_eq!(decision.selected_model.id, "gemini-2.5-pro");
        // Other categories untouched.
        assert!(router.rule_for(TaskCategory::Simple).is_some());
    }
}
