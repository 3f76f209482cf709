mod backends;
mod chain;
mod classifier;
mod health;
mod limits;
mod observability;
mod routing;
mod server;

pub use backends::*;
pub use chain::*;
pub use classifier::*;
pub use health::*;
pub use limits::*;
pub use observability::*;
pub use routing::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

fn err(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError {
        severity: ConfigSeverity::Error,
        field: field.into(),
        message: message.into(),
    }
}

fn warn(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError {
        severity: ConfigSeverity::Warning,
        field: field.into(),
        message: message.into(),
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(err("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(err("server.host", "host must not be empty"));
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(warn(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if self.limits.providers.is_empty() {
            errors.push(err("limits.providers", "no provider limits configured"));
        }
        for (name, limit) in &self.limits.providers {
            if limit.requests_per_minute == 0 {
                errors.push(err(
                    format!("limits.providers.{name}.requests_per_minute"),
                    "must be greater than 0",
                ));
            }
            if let Some(rpd) = limit.requests_per_day {
                if u64::from(rpd) < u64::from(limit.requests_per_minute) {
                    errors.push(warn(
                        format!("limits.providers.{name}.requests_per_day"),
                        "daily limit is lower than the per-minute limit",
                    ));
                }
            }
        }
        if self.limits.queue_capacity == 0 {
            errors.push(err("limits.queue_capacity", "must be greater than 0"));
        }

        if !(self.routing.throttle_threshold > 0.0 && self.routing.throttle_threshold <= 1.0) {
            errors.push(err(
                "routing.throttle_threshold",
                "must be within (0, 1]",
            ));
        }
        {
            let mut seen = std::collections::HashSet::new();
            for rule in &self.routing.rules {
                if !seen.insert(rule.category) {
                    errors.push(warn(
                        "routing.rules",
                        format!("duplicate rule for category {}", rule.category),
                    ));
                }
                if rule.primary_model_id.is_empty() {
                    errors.push(err(
                        "routing.rules",
                        format!("rule for {} has an empty primary model id", rule.category),
                    ));
                }
            }
        }

        if self.chain.attempt_timeout_ms == 0 {
            errors.push(err("chain.attempt_timeout_ms", "must be greater than 0"));
        }
        if self.chain.max_timeout_ms < self.chain.attempt_timeout_ms {
            errors.push(err(
                "chain.max_timeout_ms",
                "must be at least chain.attempt_timeout_ms",
            ));
        }
        if self.chain.backoff_cap_ms < self.chain.backoff_base_ms {
            errors.push(err(
                "chain.backoff_cap_ms",
                "must be at least chain.backoff_base_ms",
            ));
        }

        if self.health.unavailable_threshold < self.health.degraded_threshold {
            errors.push(err(
                "health.unavailable_threshold",
                "must be at least health.degraded_threshold",
            ));
        }
        if !(self.health.uptime_alert_threshold > 0.0
            && self.health.uptime_alert_threshold <= 1.0)
        {
            errors.push(err(
                "health.uptime_alert_threshold",
                "must be within (0, 1]",
            ));
        }

        if self.classifier.remote_enabled && self.classifier.endpoint.is_none() {
            errors.push(err(
                "classifier.endpoint",
                "remote classification is enabled but no endpoint is configured",
            ));
        }

        for (name, backend) in &self.backends.providers {
            if backend.base_url.is_empty() {
                errors.push(err(
                    format!("backends.providers.{name}.base_url"),
                    "base_url must not be empty",
                ));
            }
        }

        errors
    }
}
