//! AppState construction and background-task spawning extracted from
//! `main.rs`, shared by `serve` and `doctor`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use sy_admission::{QueueProcessor, QueuedRequest, RateLimiter};
use sy_domain::config::{Config, ConfigSeverity};
use sy_domain::Result;
use sy_registry::ModelRegistry;
use sy_resilience::{ErrorStats, FallbackRunner, HealthChecker};
use sy_routing::{default_rules, validate_rules, IntelligentRouter, RemoteClassifier,
    TaskClassifier};

use crate::executor::{HttpExecutor, HttpHealthProbe, HttpRemoteClassifier};
use crate::state::AppState;

const DEPRECATION_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Queued work carries no payload; admission back into the rate window
/// happens in the drain worker, so processing is an acknowledgement.
struct AdmitProcessor;

#[async_trait::async_trait]
impl QueueProcessor for AdmitProcessor {
    async fn process(&self, request: &QueuedRequest) -> Result<()> {
        tracing::debug!(
            id = %request.id,
            provider = %request.provider,
            "queued request readmitted"
        );
        Ok(())
    }
}

/// Validate config, build every service and return a fully-wired
/// [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Model registry ───────────────────────────────────────────────
    let registry = Arc::new(ModelRegistry::with_default_catalog()?);
    tracing::info!(models = registry.registry_stats().total, "model registry ready");

    // ── Routing-rule sanity ──────────────────────────────────────────
    let valid_ids: std::collections::HashSet<String> = registry
        .active_models()
        .into_iter()
        .map(|m| m.id)
        .collect();
    let mut rules = default_rules();
    for rule in &config.routing.rules {
        if let Some(existing) = rules.iter_mut().find(|r| r.category == rule.category) {
            *existing = rule.clone();
        } else {
            rules.push(rule.clone());
        }
    }
    let validation = validate_rules(&rules, &valid_ids);
    for (category, id) in &validation.unknown_model_ids {
        tracing::warn!(%category, model = %id, "routing rule references unknown model");
    }
    for category in &validation.missing_categories {
        tracing::warn!(%category, "no routing rule for category");
    }

    // ── Rate limiter + queue processor ───────────────────────────────
    let limiter = Arc::new(RateLimiter::new(&config.limits));
    limiter.set_processor(Arc::new(AdmitProcessor));
    tracing::info!(
        providers = limiter.provider_names().len(),
        queue_capacity = config.limits.queue_capacity,
        "rate limiter ready"
    );

    // ── Classifier ───────────────────────────────────────────────────
    let remote: Option<Arc<dyn RemoteClassifier>> = match (
        config.classifier.remote_enabled,
        &config.classifier.endpoint,
    ) {
        (true, Some(endpoint)) => Some(Arc::new(HttpRemoteClassifier::new(
            config.classifier.clone(),
            endpoint.clone(),
        ))),
        _ => None,
    };
    let classifier = Arc::new(TaskClassifier::new(config.classifier.clone(), remote));
    tracing::info!(
        remote = config.classifier.remote_enabled,
        "task classifier ready"
    );

    // ── Router ───────────────────────────────────────────────────────
    let router = Arc::new(IntelligentRouter::new(
        Arc::clone(&registry),
        Arc::clone(&limiter),
        &config.routing,
    ));
    tracing::info!("router ready");

    // ── Fallback runner + error stats ────────────────────────────────
    let error_stats = Arc::new(ErrorStats::new());
    let runner = Arc::new(FallbackRunner::new(
        Arc::clone(&registry),
        Arc::clone(&limiter),
        Arc::clone(&error_stats),
        config.chain,
    ));
    tracing::info!("fallback runner ready");

    // ── Health checker ───────────────────────────────────────────────
    let probe = Arc::new(HttpHealthProbe::new(
        config.backends.providers.clone(),
        Duration::from_secs(config.health.timeout_secs),
    ));
    let checker = Arc::new(HealthChecker::new(
        Arc::clone(&registry),
        probe,
        config.health,
    ));
    tracing::info!(
        interval_secs = config.health.interval_secs,
        "health checker ready"
    );

    // ── Executor ─────────────────────────────────────────────────────
    let executor = Arc::new(HttpExecutor::new(config.backends.providers.clone()));

    // ── API token (read once) ────────────────────────────────────────
    let api_token_hash = match std::env::var(&config.server.token_env) {
        Ok(token) if !token.is_empty() => Some(Sha256::digest(token.as_bytes()).to_vec()),
        _ => {
            tracing::warn!(
                env = %config.server.token_env,
                "API token env var not set — authentication disabled"
            );
            None
        }
    };

    Ok(AppState {
        config,
        registry,
        limiter,
        classifier,
        router,
        runner,
        checker,
        error_stats,
        executor,
        api_token_hash,
        started_at: Instant::now(),
    })
}

/// Start the health sweep, the per-provider drain workers, and the daily
/// deprecation sweep. All tasks stop when `cancel` fires.
pub fn spawn_background_tasks(
    state: &AppState,
    cancel: &CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    handles.push(Arc::clone(&state.checker).spawn(cancel.child_token()));
    handles.extend(state.limiter.spawn_drain_workers(cancel.child_token()));

    let registry = Arc::clone(&state.registry);
    let sweep_cancel = cancel.child_token();
    handles.push(tokio::spawn(async move {
        loop {
            let outcome = registry.sweep_deprecations(Utc::now());
            if !outcome.died.is_empty() || !outcome.dying.is_empty() {
                tracing::info!(
                    died = ?outcome.died,
                    dying = ?outcome.dying,
                    "deprecation sweep applied lifecycle changes"
                );
            }
            tokio::select! {
                _ = sweep_cancel.cancelled() => break,
                _ = tokio::time::sleep(DEPRECATION_SWEEP_INTERVAL) => {}
            }
        }
    }));

    handles
}
