//! End-to-end chain behavior over the public API: registry stats, limiter
//! accounting, and the unavailable-provider set all move together.

use parking_lot::Mutex;
use std::sync::Arc;
use sy_admission::RateLimiter;
use sy_domain::config::{ChainConfig, LimitsConfig};
use sy_domain::model::{ModelDescriptor, TaskCategory};
use sy_domain::request::{GenerateRequest, GenerateResponse};
use sy_domain::BackendError;
use sy_registry::{catalog::default_catalog, ModelRegistry};
use sy_resilience::{ErrorStats, Executor, FallbackRunner};

struct FlakyExecutor {
    /// Providers that currently error with 503.
    down: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Executor for FlakyExecutor {
    async fn generate(
        &self,
        model: &ModelDescriptor,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, BackendError> {
        if self.down.lock().contains(&model.provider) {
            return Err(BackendError::from_status(503, "provider down"));
        }
        Ok(GenerateResponse {
            text: format!("echo: {}", request.prompt),
            model_used: model.id.clone(),
            usage: None,
        })
    }
}

fn make_stack() -> (Arc<ModelRegistry>, Arc<RateLimiter>, Arc<ErrorStats>, FallbackRunner) {
    let registry = Arc::new(ModelRegistry::new(default_catalog()).unwrap());
    let limiter = Arc::new(RateLimiter::new(&LimitsConfig::default()));
    let errors = Arc::new(ErrorStats::new());
    let runner = FallbackRunner::new(
        Arc::clone(&registry),
        Arc::clone(&limiter),
        Arc::clone(&errors),
        ChainConfig {
            backoff_base_ms: 1,
            backoff_cap_ms: 4,
            ..ChainConfig::default()
        },
    );
    (registry, limiter, errors, runner)
}

fn chain_of(ids: &[&str]) -> Vec<ModelDescriptor> {
    let catalog = default_catalog();
    ids.iter()
        .map(|id| catalog.iter().find(|m| m.id == *id).cloned().unwrap())
        .collect()
}

fn request(prompt: &str) -> GenerateRequest {
    GenerateRequest {
        prompt: prompt.into(),
        ..GenerateRequest::default()
    }
}

#[tokio::test]
async fn success_updates_registry_and_limiter_together() {
    let (registry, limiter, _, runner) = make_stack();
    let chain = chain_of(&["cerebras-deepseek-v3-0324", "gemini-2.5-pro"]);
    let executor = FlakyExecutor {
        down: Mutex::new(Vec::new()),
    };

    let outcome = runner
        .execute_with_fallback(&request("fix this"), &chain, TaskCategory::Coding, &executor)
        .await
        .unwrap();
    assert_eq!(outcome.model_used, "cerebras-deepseek-v3-0324");
    assert_eq!(outcome.fallback_depth, 1);

    let stats = registry.usage_stats("cerebras-deepseek-v3-0324").unwrap();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.error_count, 0);
    assert!(limiter.utilization("cerebras") > 0.0);
}

#[tokio::test]
async fn provider_outage_shifts_traffic_and_recovers() {
    let (registry, _, errors, runner) = make_stack();
    let chain = chain_of(&[
        "cerebras-deepseek-v3-0324",
        "cerebras-gpt-oss-120b",
        "gemini-2.5-pro",
    ]);
    let executor = FlakyExecutor {
        down: Mutex::new(vec!["cerebras".into()]),
    };

    let outcome = runner
        .execute_with_fallback(&request("hello"), &chain, TaskCategory::Coding, &executor)
        .await
        .unwrap();
    assert_eq!(outcome.model_used, "gemini-2.5-pro");
    assert_eq!(outcome.fallback_depth, 3);
    assert_eq!(registry.usage_stats("cerebras-deepseek-v3-0324").unwrap().error_count, 1);
    assert_eq!(errors.snapshot().total_errors, 2);

    // Outage over: primary serves again (503 is transient, the provider
    // was never auth-blocked).
    executor.down.lock().clear();
    let outcome = runner
        .execute_with_fallback(&request("hello"), &chain, TaskCategory::Coding, &executor)
        .await
        .unwrap();
    assert_eq!(outcome.model_used, "cerebras-deepseek-v3-0324");
    assert!(runner.unavailable_providers().is_empty());
}

#[tokio::test]
async fn full_outage_is_a_terminal_error_with_context() {
    let (_, _, errors, runner) = make_stack();
    let chain = chain_of(&["groq-llama-3.2-3b", "gemini-2.5-flash"]);
    let executor = FlakyExecutor {
        down: Mutex::new(vec!["groq".into(), "google".into()]),
    };

    let err = runner
        .execute_with_fallback(&request("hello"), &chain, TaskCategory::Simple, &executor)
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("groq-llama-3.2-3b"));
    assert!(msg.contains("gemini-2.5-flash"));
    assert_eq!(errors.recent(10).len(), 2);
}
