use std::sync::Arc;
use std::time::Instant;

use sy_admission::RateLimiter;
use sy_domain::config::Config;
use sy_registry::ModelRegistry;
use sy_resilience::{ErrorStats, Executor, FallbackRunner, HealthChecker};
use sy_routing::{IntelligentRouter, TaskClassifier};

/// Shared application state passed to all API handlers.
///
/// Every service is a plain struct built in [`crate::bootstrap`] and shared
/// as an `Arc` handle; nothing here is global.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub registry: Arc<ModelRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub classifier: Arc<TaskClassifier>,
    pub router: Arc<IntelligentRouter>,
    pub runner: Arc<FallbackRunner>,
    pub checker: Arc<HealthChecker>,
    pub error_stats: Arc<ErrorStats>,

    /// Backend adapter handed to the fallback runner. Swappable for tests.
    pub executor: Arc<dyn Executor>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,

    pub started_at: Instant,
}
