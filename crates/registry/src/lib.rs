//! In-memory model registry: the single source of truth for which models
//! exist, their lifecycle/health state, and their usage statistics.
//!
//! Records are created at load and never deleted for the lifetime of the
//! process; deprecation is expressed through lifecycle status. All methods
//! take `&self` and are safe to call from any task.

pub mod catalog;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use sy_domain::model::{
    Capability, HealthStatus, LifecycleStatus, ModelDescriptor, UsageStats,
};
use sy_domain::trace::TraceEvent;
use sy_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ModelRegistry {
    models: RwLock<HashMap<String, ModelDescriptor>>,
    stats: RwLock<HashMap<String, UsageStats>>,
}

/// Aggregate counts over the whole registry.
#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct RegistryStats {
    pub total: usize,
    pub active: usize,
    pub dying: usize,
    pub dead: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unavailable: usize,
    pub disabled: usize,
}

/// What a deprecation sweep changed.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SweepOutcome {
    /// Models whose deprecation date passed; now DEAD.
    pub died: Vec<String>,
    /// ACTIVE models within 30 days of deprecation; now DYING.
    pub dying: Vec<String>,
}

impl ModelRegistry {
    /// Build a registry from descriptors, validating replacement references.
    pub fn new(models: Vec<ModelDescriptor>) -> Result<Self> {
        let by_id: HashMap<String, ModelDescriptor> = models
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();

        for model in by_id.values() {
            if let Some(repl) = &model.lifecycle.replacement_model_id {
                let target = by_id.get(repl).ok_or_else(|| {
                    Error::Config(format!(
                        "model {} names unknown replacement {repl}",
                        model.id
                    ))
                })?;
                if target.lifecycle.status != LifecycleStatus::Active {
                    return Err(Error::Config(format!(
                        "model {} names non-active replacement {repl}",
                        model.id
                    )));
                }
            }
        }

        Ok(Self {
            models: RwLock::new(by_id),
            stats: RwLock::new(HashMap::new()),
        })
    }

    /// Registry seeded with the built-in catalog.
    pub fn with_default_catalog() -> Result<Self> {
        Self::new(catalog::default_catalog())
    }

    // ── lookups ──

    pub fn get(&self, id: &str) -> Option<ModelDescriptor> {
        self.models.read().get(id).cloned()
    }

    /// All enabled, non-DEAD models (DYING models still route).
    pub fn active_models(&self) -> Vec<ModelDescriptor> {
        self.models
            .read()
            .values()
            .filter(|m| m.enabled && m.lifecycle.status != LifecycleStatus::Dead)
            .cloned()
            .collect()
    }

    pub fn models_by_capability(&self, cap: Capability) -> Vec<ModelDescriptor> {
        self.models
            .read()
            .values()
            .filter(|m| m.has_capability(cap))
            .cloned()
            .collect()
    }

    pub fn models_by_provider(&self, provider: &str) -> Vec<ModelDescriptor> {
        self.models
            .read()
            .values()
            .filter(|m| m.provider == provider)
            .cloned()
            .collect()
    }

    pub fn models_by_lifecycle(&self, status: LifecycleStatus) -> Vec<ModelDescriptor> {
        self.models
            .read()
            .values()
            .filter(|m| m.lifecycle.status == status)
            .cloned()
            .collect()
    }

    /// Strict availability: enabled, ACTIVE, and not UNAVAILABLE.
    pub fn is_available(&self, id: &str) -> bool {
        self.models.read().get(id).is_some_and(|m| {
            m.enabled
                && m.lifecycle.status == LifecycleStatus::Active
                && m.lifecycle.health_status != HealthStatus::Unavailable
        })
    }

    /// The configured replacement, only once the model is DEAD.
    pub fn replacement_for(&self, id: &str) -> Option<String> {
        let models = self.models.read();
        let model = models.get(id)?;
        if model.lifecycle.status == LifecycleStatus::Dead {
            model.lifecycle.replacement_model_id.clone()
        } else {
            None
        }
    }

    // ── usage recording (hot path, unknown ids are a silent no-op) ──

    pub fn record_success(&self, id: &str, latency_ms: u64) {
        if !self.models.read().contains_key(id) {
            return;
        }
        self.stats
            .write()
            .entry(id.to_string())
            .or_default()
            .record_success(latency_ms);
    }

    pub fn record_error(&self, id: &str) {
        if !self.models.read().contains_key(id) {
            return;
        }
        self.stats
            .write()
            .entry(id.to_string())
            .or_default()
            .record_error();
    }

    pub fn usage_stats(&self, id: &str) -> Option<UsageStats> {
        if !self.models.read().contains_key(id) {
            return None;
        }
        Some(self.stats.read().get(id).copied().unwrap_or_default())
    }

    pub fn registry_stats(&self) -> RegistryStats {
        let models = self.models.read();
        let mut out = RegistryStats {
            total: models.len(),
            ..Default::default()
        };
        for m in models.values() {
            match m.lifecycle.status {
                LifecycleStatus::Active => out.active += 1,
                LifecycleStatus::Dying => out.dying += 1,
                LifecycleStatus::Dead => out.dead += 1,
            }
            match m.lifecycle.health_status {
                HealthStatus::Healthy => out.healthy += 1,
                HealthStatus::Degraded => out.degraded += 1,
                HealthStatus::Unavailable => out.unavailable += 1,
            }
            if !m.enabled {
                out.disabled += 1;
            }
        }
        out
    }

    // ── lifecycle writes ──

    /// Force a model DEAD, optionally installing a replacement pointer.
    /// Returns false for unknown ids.
    pub fn mark_dead(&self, id: &str, replacement: Option<String>) -> bool {
        let mut models = self.models.write();
        let Some(model) = models.get_mut(id) else {
            return false;
        };
        model.lifecycle.status = LifecycleStatus::Dead;
        if replacement.is_some() {
            model.lifecycle.replacement_model_id = replacement;
        }
        TraceEvent::ModelDeprecated {
            model: id.to_string(),
            replacement: model.lifecycle.replacement_model_id.clone(),
        }
        .emit();
        true
    }

    /// Returns false for unknown ids.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut models = self.models.write();
        match models.get_mut(id) {
            Some(model) => {
                model.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Advance lifecycle state from deprecation dates. Idempotent; intended
    /// to run daily from a background task.
    pub fn sweep_deprecations(&self, now: DateTime<Utc>) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let mut models = self.models.write();
        for model in models.values_mut() {
            let Some(date) = model.lifecycle.deprecation_date else {
                continue;
            };
            if date <= now && model.lifecycle.status != LifecycleStatus::Dead {
                model.lifecycle.status = LifecycleStatus::Dead;
                outcome.died.push(model.id.clone());
                TraceEvent::ModelDeprecated {
                    model: model.id.clone(),
                    replacement: model.lifecycle.replacement_model_id.clone(),
                }
                .emit();
            } else if date <= now + Duration::days(30)
                && model.lifecycle.status == LifecycleStatus::Active
            {
                model.lifecycle.status = LifecycleStatus::Dying;
                outcome.dying.push(model.id.clone());
                tracing::warn!(model = %model.id, deprecation = %date, "model is approaching deprecation");
            }
        }
        outcome
    }

    /// Health write path, reserved for the health checker. Returns the
    /// previous status for transition detection; None for unknown ids.
    pub fn set_health(
        &self,
        id: &str,
        status: HealthStatus,
        checked_at: DateTime<Utc>,
    ) -> Option<HealthStatus> {
        let mut models = self.models.write();
        let model = models.get_mut(id)?;
        let previous = model.lifecycle.health_status;
        model.lifecycle.health_status = status;
        model.lifecycle.last_health_check = Some(checked_at);
        Some(previous)
    }
}
