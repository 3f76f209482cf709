use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capabilities and lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A modality or feature a model supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    Text,
    Vision,
    AudioIn,
    AudioOut,
    ImageGen,
    VideoGen,
    ComputerUse,
}

/// Where a model sits in its deprecation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    /// Fully routable.
    Active,
    /// Past its deprecation date; routable but logged as a warning.
    Dying,
    /// Removed from routing entirely.
    Dead,
}

/// Health as observed by the periodic checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unavailable,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Lifecycle and health state attached to a model descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelLifecycle {
    pub status: LifecycleStatus,
    /// After this instant an ACTIVE model is treated as DYING.
    #[serde(default)]
    pub deprecation_date: Option<DateTime<Utc>>,
    /// Suggested replacement once this model dies.
    #[serde(default)]
    pub replacement_model_id: Option<String>,
    #[serde(default = "d_healthy")]
    pub health_status: HealthStatus,
    #[serde(default)]
    pub last_health_check: Option<DateTime<Utc>>,
}

fn d_healthy() -> HealthStatus {
    HealthStatus::Healthy
}

impl Default for ModelLifecycle {
    fn default() -> Self {
        Self {
            status: LifecycleStatus::Active,
            deprecation_date: None,
            replacement_model_id: None,
            health_status: HealthStatus::Healthy,
            last_health_check: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rate limits and generation parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Published rate limits for a model or provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests_per_minute: u32,
    #[serde(default)]
    pub requests_per_day: Option<u32>,
    #[serde(default)]
    pub tokens_per_minute: Option<u64>,
}

/// Default sampling parameters a model is invoked with unless the request
/// overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelParams {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model descriptor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Broad family a model belongs to, independent of task routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    General,
    Coding,
    Math,
    Conversation,
    Multimodal,
}

/// Everything the control plane knows about one routable model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Stable internal identifier, e.g. `gemini-2.5-flash`.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Owning provider, e.g. `google` or `cerebras`.
    pub provider: String,
    /// Identifier the backend API expects, when it differs from `id`.
    #[serde(default)]
    pub backend_id: Option<String>,
    pub category: ModelCategory,
    pub capabilities: Vec<Capability>,
    pub context_window: u32,
    pub max_output_tokens: u32,
    #[serde(default)]
    pub supports_streaming: bool,
    #[serde(default)]
    pub lifecycle: ModelLifecycle,
    pub rate_limit: RateLimit,
    /// Routing preference within a category chain; higher wins ties.
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub default_params: ModelParams,
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// USD per token, when the provider publishes one.
    #[serde(default)]
    pub cost_per_token: Option<f64>,
}

fn d_true() -> bool {
    true
}

impl ModelDescriptor {
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    /// The identifier sent to the backend API.
    pub fn backend_id(&self) -> &str {
        self.backend_id.as_deref().unwrap_or(&self.id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Usage statistics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Rolling usage counters for one model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct UsageStats {
    pub total_requests: u64,
    pub error_count: u64,
    /// Running mean latency over successful calls only, in milliseconds.
    pub average_latency_ms: f64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl UsageStats {
    pub fn successes(&self) -> u64 {
        self.total_requests - self.error_count
    }

    /// Fraction of total requests that succeeded. 1.0 when unused.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successes() as f64 / self.total_requests as f64
        }
    }

    /// Fold a successful call into the counters.
    pub fn record_success(&mut self, latency_ms: u64) {
        let n = self.successes() as f64;
        self.average_latency_ms = (self.average_latency_ms * n + latency_ms as f64) / (n + 1.0);
        self.total_requests += 1;
        self.last_used = Some(Utc::now());
    }

    /// Fold a failed call into the counters. Latency is not sampled.
    pub fn record_error(&mut self) {
        self.total_requests += 1;
        self.error_count += 1;
        self.last_used = Some(Utc::now());
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task taxonomy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The kinds of work the classifier can assign a request to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskCategory {
    Simple,
    Medium,
    Complex,
    Coding,
    Reasoning,
    VisionIn,
    ImageGen,
    VideoGen,
    Multilingual,
    Agentic,
    LongContext,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 11] = [
        Self::Simple,
        Self::Medium,
        Self::Complex,
        Self::Coding,
        Self::Reasoning,
        Self::VisionIn,
        Self::ImageGen,
        Self::VideoGen,
        Self::Multilingual,
        Self::Agentic,
        Self::LongContext,
    ];
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Simple => "SIMPLE",
            Self::Medium => "MEDIUM",
            Self::Complex => "COMPLEX",
            Self::Coding => "CODING",
            Self::Reasoning => "REASONING",
            Self::VisionIn => "VISION_IN",
            Self::ImageGen => "IMAGE_GEN",
            Self::VideoGen => "VIDEO_GEN",
            Self::Multilingual => "MULTILINGUAL",
            Self::Agentic => "AGENTIC",
            Self::LongContext => "LONG_CONTEXT",
        };
        f.write_str(s)
    }
}

/// Coarse effort estimate for a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_stats_running_mean_over_successes_only() {
        let mut stats = UsageStats::default();
        stats.record_success(100);
        stats.record_error();
        stats.record_success(300);

        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.successes(), 2);
        assert_eq!(stats.error_count, 1);
        assert!((stats.average_latency_ms - 200.0).abs() < f64::EPSILON);
        assert!((stats.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn success_rate_of_unused_model_is_one() {
        assert_eq!(UsageStats::default().success_rate(), 1.0);
    }

    #[test]
    fn category_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&TaskCategory::LongContext).unwrap();
        assert_eq!(json, "\"LONG_CONTEXT\"");
        let back: TaskCategory = serde_json::from_str("\"VISION_IN\"").unwrap();
        assert_eq!(back, TaskCategory::VisionIn);
    }
}
