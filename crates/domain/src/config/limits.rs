use crate::model::RateLimit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Admission control settings: published per-provider rate limits plus the
/// shared queue sizing used when a provider is saturated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Published free-tier limits keyed by provider name. When the section
    /// is present in config it replaces the built-in table entirely.
    #[serde(default = "default_provider_limits")]
    pub providers: HashMap<String, RateLimit>,
    /// Maximum queued requests per provider before enqueue is rejected.
    #[serde(default = "d_queue_capacity")]
    pub queue_capacity: usize,
    /// Utilization at or above which a peak sample is recorded.
    #[serde(default = "d_peak_threshold")]
    pub peak_threshold: f64,
    /// Utilization at or above which an alert is raised.
    #[serde(default = "d_alert_threshold")]
    pub alert_threshold: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            providers: default_provider_limits(),
            queue_capacity: d_queue_capacity(),
            peak_threshold: d_peak_threshold(),
            alert_threshold: d_alert_threshold(),
        }
    }
}

fn d_queue_capacity() -> usize {
    100
}

fn d_peak_threshold() -> f64 {
    0.8
}

fn d_alert_threshold() -> f64 {
    0.8
}

/// Published free-tier limits for the providers the default catalog uses.
pub fn default_provider_limits() -> HashMap<String, RateLimit> {
    let mut m = HashMap::new();
    m.insert(
        "cerebras".to_string(),
        RateLimit {
            requests_per_minute: 100,
            requests_per_day: Some(50_000),
            tokens_per_minute: None,
        },
    );
    m.insert(
        "groq".to_string(),
        RateLimit {
            requests_per_minute: 30,
            requests_per_day: Some(14_400),
            tokens_per_minute: None,
        },
    );
    m.insert(
        "google".to_string(),
        RateLimit {
            requests_per_minute: 15,
            requests_per_day: Some(1_500),
            tokens_per_minute: None,
        },
    );
    m.insert(
        "huggingface".to_string(),
        RateLimit {
            requests_per_minute: 60,
            requests_per_day: Some(10_000),
            tokens_per_minute: None,
        },
    );
    m.insert(
        "elevenlabs".to_string(),
        RateLimit {
            requests_per_minute: 20,
            requests_per_day: Some(5_000),
            tokens_per_minute: None,
        },
    );
    m
}
