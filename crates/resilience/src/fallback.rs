//! Fallback chain execution: walk an ordered model list, retrying,
//! advancing, or aborting according to each failure's classification.

use crate::report::{classify_backend_error, ErrorContext, RecoveryAction};
use crate::stats::ErrorStats;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sy_admission::RateLimiter;
use sy_domain::config::ChainConfig;
use sy_domain::error::AttemptFailure;
use sy_domain::model::{ModelDescriptor, TaskCategory};
use sy_domain::request::{GenerateRequest, GenerateResponse};
use sy_domain::trace::TraceEvent;
use sy_domain::{BackendError, Error, ErrorCategory, Result};
use sy_registry::ModelRegistry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Executor capability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The thing that actually calls a model backend. Injected so chain
/// behavior is testable without a network.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    async fn generate(
        &self,
        model: &ModelDescriptor,
        request: &GenerateRequest,
    ) -> std::result::Result<GenerateResponse, BackendError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Attempt log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    Success,
    Failure,
    /// Provider sat in the transient unavailable set; no call was made.
    Skipped,
}

/// One entry of the per-request attempt log.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub model_id: String,
    pub provider: String,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
    pub error_category: Option<ErrorCategory>,
    pub message: Option<String>,
}

/// A successful chain execution.
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutcome {
    pub response: GenerateResponse,
    pub model_used: String,
    pub provider: String,
    /// 1-based position of the answering model in the chain.
    pub fallback_depth: u32,
    pub attempts: Vec<AttemptRecord>,
    pub total_latency_ms: u64,
}

// ── chain metrics ──

#[derive(Debug, Clone, Copy, Serialize, Default, PartialEq)]
pub struct ModelChainStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

impl ModelChainStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CategoryChainStats {
    executions: u64,
    successes: u64,
    primary_successes: u64,
    depth_sum: u64,
}

/// Per-category chain performance served at `/v1/chains/:category`.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: TaskCategory,
    pub executions: u64,
    pub successes: u64,
    /// Fraction of successes served by the chain's first model.
    pub primary_success_rate: f64,
    pub average_fallback_depth: f64,
    /// Best/worst success rate among models with at least 5 attempts.
    pub most_reliable_model: Option<String>,
    pub least_reliable_model: Option<String>,
}

const RELIABILITY_MIN_ATTEMPTS: u64 = 5;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FallbackRunner {
    registry: Arc<ModelRegistry>,
    limiter: Arc<RateLimiter>,
    error_stats: Arc<ErrorStats>,
    cfg: ChainConfig,
    /// Providers knocked out by auth failures until manually restored.
    unavailable: RwLock<HashSet<String>>,
    model_stats: Mutex<HashMap<String, ModelChainStats>>,
    category_stats: Mutex<HashMap<TaskCategory, CategoryChainStats>>,
}

impl FallbackRunner {
    pub fn new(
        registry: Arc<ModelRegistry>,
        limiter: Arc<RateLimiter>,
        error_stats: Arc<ErrorStats>,
        cfg: ChainConfig,
    ) -> Self {
        Self {
            registry,
            limiter,
            error_stats,
            cfg,
            unavailable: RwLock::new(HashSet::new()),
            model_stats: Mutex::new(HashMap::new()),
            category_stats: Mutex::new(HashMap::new()),
        }
    }

    /// Walk the chain until a model answers.
    ///
    /// On exhaustion, the returned `AllModelsFailed` lists every attempted
    /// model with its last error message.
    pub async fn execute_with_fallback(
        &self,
        request: &GenerateRequest,
        models: &[ModelDescriptor],
        category: TaskCategory,
        executor: &dyn Executor,
    ) -> Result<ChainOutcome> {
        let chain_started = Instant::now();
        let estimated_tokens = estimate_request_tokens(request);
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut failures: Vec<AttemptFailure> = Vec::new();
        let mut attempt_no: u32 = 0;

        self.category_stats
            .lock()
            .entry(category)
            .or_default()
            .executions += 1;

        for (index, model) in models.iter().enumerate() {
            if self.is_provider_unavailable(&model.provider) {
                attempts.push(AttemptRecord {
                    model_id: model.id.clone(),
                    provider: model.provider.clone(),
                    attempt: attempt_no,
                    outcome: AttemptOutcome::Skipped,
                    latency_ms: 0,
                    error_category: Some(ErrorCategory::AuthError),
                    message: Some("provider in unavailable set".into()),
                });
                continue;
            }

            // A rate-blocked provider counts as a RATE_LIMIT attempt and
            // the chain advances; there is no in-line waiting.
            if !self.limiter.can_execute(&model.provider, estimated_tokens) {
                attempt_no += 1;
                attempts.push(AttemptRecord {
                    model_id: model.id.clone(),
                    provider: model.provider.clone(),
                    attempt: attempt_no,
                    outcome: AttemptOutcome::Failure,
                    latency_ms: 0,
                    error_category: Some(ErrorCategory::RateLimit),
                    message: Some("provider rate limit reached".into()),
                });
                failures.push(AttemptFailure {
                    model_id: model.id.clone(),
                    message: "rate limit reached".into(),
                });
                continue;
            }

            let mut timeout_ms = self.cfg.attempt_timeout_ms;
            let mut backoff_ms = self.cfg.backoff_base_ms;
            let mut retries: u32 = 0;
            loop {
                attempt_no += 1;
                self.error_stats.record_attempt(&model.id);
                self.model_stats
                    .lock()
                    .entry(model.id.clone())
                    .or_default()
                    .attempts += 1;

                let started = Instant::now();
                let outcome = tokio::time::timeout(
                    Duration::from_millis(timeout_ms),
                    executor.generate(model, request),
                )
                .await;
                let latency_ms = started.elapsed().as_millis() as u64;

                let backend_error = match outcome {
                    Ok(Ok(response)) => {
                        return Ok(self.finish_success(
                            response,
                            model,
                            category,
                            index,
                            attempt_no,
                            latency_ms,
                            chain_started,
                            attempts,
                            estimated_tokens,
                        ));
                    }
                    Ok(Err(e)) => e,
                    Err(_) => BackendError::timeout(format!(
                        "no response within {timeout_ms} ms"
                    )),
                };

                let classified = classify_backend_error(
                    &backend_error,
                    ErrorContext {
                        request_id: None,
                        model: Some(model.id.clone()),
                        provider: Some(model.provider.clone()),
                        attempt: attempt_no,
                        at: Some(Utc::now()),
                    },
                );
                self.registry.record_error(&model.id);
                self.error_stats.record(&classified);
                self.model_stats
                    .lock()
                    .entry(model.id.clone())
                    .or_default()
                    .failures += 1;
                attempts.push(AttemptRecord {
                    model_id: model.id.clone(),
                    provider: model.provider.clone(),
                    attempt: attempt_no,
                    outcome: AttemptOutcome::Failure,
                    latency_ms,
                    error_category: Some(classified.category),
                    message: Some(classified.message.clone()),
                });
                failures.push(AttemptFailure {
                    model_id: model.id.clone(),
                    message: classified.message.clone(),
                });

                match classified.recovery {
                    RecoveryAction::Retry if retries < self.cfg.retry_budget => {
                        retries += 1;
                        tracing::debug!(
                            model = %model.id,
                            retry = retries,
                            backoff_ms,
                            "retrying after timeout"
                        );
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        backoff_ms = (backoff_ms * 2).min(self.cfg.backoff_cap_ms);
                        timeout_ms = ((timeout_ms as f64 * self.cfg.timeout_multiplier) as u64)
                            .min(self.cfg.max_timeout_ms);
                        continue;
                    }
                    RecoveryAction::Reject => {
                        tracing::warn!(
                            model = %model.id,
                            category = %classified.category,
                            "chain aborted"
                        );
                        return Err(Error::Backend(backend_error));
                    }
                    _ => {
                        if classified.category == ErrorCategory::AuthError {
                            self.mark_provider_unavailable(&model.provider);
                        }
                        if let Some(next) = models.get(index + 1) {
                            TraceEvent::ModelFallback {
                                from_model: model.id.clone(),
                                to_model: next.id.clone(),
                                attempt: attempt_no,
                                reason: classified.category.to_string(),
                            }
                            .emit();
                        }
                        break;
                    }
                }
            }
        }

        Err(Error::AllModelsFailed { attempts: failures })
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_success(
        &self,
        response: GenerateResponse,
        model: &ModelDescriptor,
        category: TaskCategory,
        index: usize,
        attempt_no: u32,
        latency_ms: u64,
        chain_started: Instant,
        mut attempts: Vec<AttemptRecord>,
        estimated_tokens: u64,
    ) -> ChainOutcome {
        self.registry.record_success(&model.id, latency_ms);
        let tokens = response
            .usage
            .map(|u| u64::from(u.prompt_tokens) + u64::from(u.completion_tokens))
            .unwrap_or(estimated_tokens);
        self.limiter.record_request(&model.provider, tokens);

        {
            let mut stats = self.model_stats.lock();
            stats.entry(model.id.clone()).or_default().successes += 1;
        }
        {
            let mut stats = self.category_stats.lock();
            let entry = stats.entry(category).or_default();
            entry.successes += 1;
            entry.depth_sum += index as u64 + 1;
            if index == 0 {
                entry.primary_successes += 1;
            }
        }

        attempts.push(AttemptRecord {
            model_id: model.id.clone(),
            provider: model.provider.clone(),
            attempt: attempt_no,
            outcome: AttemptOutcome::Success,
            latency_ms,
            error_category: None,
            message: None,
        });
        TraceEvent::GenerateCompleted {
            model: model.id.clone(),
            provider: model.provider.clone(),
            duration_ms: chain_started.elapsed().as_millis() as u64,
            attempts: attempt_no,
        }
        .emit();

        ChainOutcome {
            response,
            model_used: model.id.clone(),
            provider: model.provider.clone(),
            fallback_depth: index as u32 + 1,
            attempts,
            total_latency_ms: chain_started.elapsed().as_millis() as u64,
        }
    }

    // ── provider unavailable set ──

    pub fn is_provider_unavailable(&self, provider: &str) -> bool {
        self.unavailable.read().contains(provider)
    }

    fn mark_provider_unavailable(&self, provider: &str) {
        let inserted = self.unavailable.write().insert(provider.to_string());
        if inserted {
            TraceEvent::ProviderUnavailable {
                provider: provider.to_string(),
                reason: "authentication failure".into(),
            }
            .emit();
        }
    }

    /// Clear a provider from the unavailable set (operator action).
    pub fn mark_provider_available(&self, provider: &str) -> bool {
        self.unavailable.write().remove(provider)
    }

    pub fn unavailable_providers(&self) -> Vec<String> {
        let mut v: Vec<String> = self.unavailable.read().iter().cloned().collect();
        v.sort();
        v
    }

    // ── metrics surface ──

    pub fn model_stats(&self) -> HashMap<String, ModelChainStats> {
        self.model_stats.lock().clone()
    }

    pub fn category_report(&self, category: TaskCategory) -> CategoryReport {
        let stats = self
            .category_stats
            .lock()
            .get(&category)
            .copied()
            .unwrap_or_default();
        let models = self.model_stats.lock();
        let mut reliable: Vec<(&String, f64)> = models
            .iter()
            .filter(|(_, s)| s.attempts >= RELIABILITY_MIN_ATTEMPTS)
            .map(|(id, s)| (id, s.success_rate()))
            .collect();
        reliable.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        CategoryReport {
            category,
            executions: stats.executions,
            successes: stats.successes,
            primary_success_rate: if stats.successes > 0 {
                stats.primary_successes as f64 / stats.successes as f64
            } else {
                0.0
            },
            average_fallback_depth: if stats.successes > 0 {
                stats.depth_sum as f64 / stats.successes as f64
            } else {
                0.0
            },
            most_reliable_model: reliable.last().map(|(id, _)| (*id).clone()),
            least_reliable_model: reliable.first().map(|(id, _)| (*id).clone()),
        }
    }

    pub fn reset_stats(&self) {
        self.model_stats.lock().clear();
        self.category_stats.lock().clear();
    }
}

/// chars/4 when the caller gave no better estimate.
fn estimate_request_tokens(request: &GenerateRequest) -> u64 {
    let chars: usize = request.prompt.chars().count()
        + request
            .history
            .iter()
            .map(|m| m.content.chars().count())
            .sum::<usize>();
    (chars as u64).div_ceil(4)
}
