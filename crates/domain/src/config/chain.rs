use serde::{Deserialize, Serialize};

/// Fallback chain execution parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Deadline for the first attempt against each model.
    #[serde(default = "d_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    /// Each timeout escalation multiplies the previous deadline by this.
    #[serde(default = "d_timeout_multiplier")]
    pub timeout_multiplier: f64,
    /// Hard ceiling on any single attempt's deadline.
    #[serde(default = "d_max_timeout_ms")]
    pub max_timeout_ms: u64,
    /// Retries allowed against the same model before moving down the chain.
    #[serde(default = "d_retry_budget")]
    pub retry_budget: u32,
    /// First backoff delay between attempts; doubles each time.
    #[serde(default = "d_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Ceiling on the backoff delay.
    #[serde(default = "d_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: d_attempt_timeout_ms(),
            timeout_multiplier: d_timeout_multiplier(),
            max_timeout_ms: d_max_timeout_ms(),
            retry_budget: d_retry_budget(),
            backoff_base_ms: d_backoff_base_ms(),
            backoff_cap_ms: d_backoff_cap_ms(),
        }
    }
}

fn d_attempt_timeout_ms() -> u64 {
    4_000
}

fn d_timeout_multiplier() -> f64 {
    1.5
}

fn d_max_timeout_ms() -> u64 {
    10_000
}

fn d_retry_budget() -> u32 {
    2
}

fn d_backoff_base_ms() -> u64 {
    300
}

fn d_backoff_cap_ms() -> u64 {
    5_000
}
