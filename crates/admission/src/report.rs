use chrono::{DateTime, Utc};
use serde::Serialize;
use sy_domain::model::RateLimit;

/// One high-utilization observation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PeakSample {
    pub at: DateTime<Utc>,
    pub utilization: f64,
}

/// Point-in-time view of one provider's admission state.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderReport {
    pub provider: String,
    pub limits: RateLimit,
    pub requests_this_minute: u32,
    pub requests_today: u32,
    pub tokens_this_minute: u64,
    pub utilization: f64,
    pub queue_length: usize,
    pub total_requests: u64,
    pub throttled_requests: u64,
    pub average_wait_ms: u64,
    pub peak_samples: Vec<PeakSample>,
}

/// A provider running hot enough to need attention.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub provider: String,
    pub utilization: f64,
    pub queue_length: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Summary {
    pub total_requests: u64,
    pub total_throttled: u64,
    pub average_utilization: f64,
    /// The single highest-utilization provider, when any exist.
    pub busiest_provider: Option<String>,
}

/// The full statistics report served at `/v1/limits`.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub providers: Vec<ProviderReport>,
    pub alerts: Vec<Alert>,
    pub summary: Summary,
}
