use serde::{Deserialize, Serialize};

/// Periodic health checking parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Interval between sweeps over all active models.
    #[serde(default = "d_interval_secs")]
    pub interval_secs: u64,
    /// Deadline for a single probe.
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    /// Consecutive failures before a model is marked DEGRADED.
    #[serde(default = "d_degraded_threshold")]
    pub degraded_threshold: u32,
    /// Consecutive failures before a model is marked UNAVAILABLE.
    #[serde(default = "d_unavailable_threshold")]
    pub unavailable_threshold: u32,
    /// Uptime ratio below which an alert is raised.
    #[serde(default = "d_uptime_alert_threshold")]
    pub uptime_alert_threshold: f64,
    /// Probe outcomes retained per model for uptime calculation.
    #[serde(default = "d_history_window")]
    pub history_window: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: d_interval_secs(),
            timeout_secs: d_timeout_secs(),
            degraded_threshold: d_degraded_threshold(),
            unavailable_threshold: d_unavailable_threshold(),
            uptime_alert_threshold: d_uptime_alert_threshold(),
            history_window: d_history_window(),
        }
    }
}

fn d_interval_secs() -> u64 {
    300
}

fn d_timeout_secs() -> u64 {
    10
}

fn d_degraded_threshold() -> u32 {
    1
}

fn d_unavailable_threshold() -> u32 {
    3
}

fn d_uptime_alert_threshold() -> f64 {
    0.95
}

fn d_history_window() -> usize {
    100
}
