//! Periodic health checking with consecutive-failure thresholds and a
//! broadcast event stream.
//!
//! The checker is the sole writer of `health_status` and
//! `last_health_check` on registry records.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use sy_domain::config::HealthConfig;
use sy_domain::model::{HealthStatus, ModelDescriptor};
use sy_domain::trace::TraceEvent;
use sy_domain::{BackendError, Error, Result};
use sy_registry::ModelRegistry;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const UPTIME_ALERT_MIN_CHECKS: usize = 10;
const EVENT_CHANNEL_CAP: usize = 256;

/// Probe capability: ping one model cheaply. Injected so the checker is
/// testable without a network.
#[async_trait::async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, model: &ModelDescriptor) -> std::result::Result<(), BackendError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealthEvent {
    CheckCompleted {
        model: String,
        healthy: bool,
        latency_ms: u64,
    },
    StatusChanged {
        model: String,
        from: HealthStatus,
        to: HealthStatus,
    },
    UptimeAlert {
        model: String,
        uptime: f64,
    },
}

#[derive(Debug, Default)]
struct ModelHealthState {
    consecutive_failures: u32,
    history: VecDeque<bool>,
    alerted: bool,
}

impl ModelHealthState {
    fn uptime(&self) -> Option<f64> {
        if self.history.is_empty() {
            return None;
        }
        let up = self.history.iter().filter(|b| **b).count();
        Some(up as f64 / self.history.len() as f64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct HealthSummary {
    pub healthy: usize,
    pub degraded: usize,
    pub unavailable: usize,
    /// Mean uptime across active models with at least one recorded check.
    pub average_uptime: f64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Checker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HealthChecker {
    registry: Arc<ModelRegistry>,
    probe: Arc<dyn HealthProbe>,
    cfg: HealthConfig,
    states: Mutex<HashMap<String, ModelHealthState>>,
    events: broadcast::Sender<HealthEvent>,
}

impl HealthChecker {
    pub fn new(
        registry: Arc<ModelRegistry>,
        probe: Arc<dyn HealthProbe>,
        cfg: HealthConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAP);
        Self {
            registry,
            probe,
            cfg,
            states: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.events.subscribe()
    }

    /// Probe one model and fold the result into its health state.
    /// Returns whether the probe succeeded.
    pub async fn check_model(&self, id: &str) -> Result<bool> {
        let model = self
            .registry
            .get(id)
            .ok_or_else(|| Error::UnknownModel(id.to_string()))?;

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(self.cfg.timeout_secs),
            self.probe.probe(&model),
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let healthy = matches!(outcome, Ok(Ok(())));
        if let Ok(Err(e)) = &outcome {
            tracing::debug!(model = %id, error = %e, "health probe failed");
        }

        let (new_status, uptime_alert) = {
            let mut states = self.states.lock();
            let state = states.entry(id.to_string()).or_default();
            if healthy {
                state.consecutive_failures = 0;
            } else {
                state.consecutive_failures += 1;
            }
            if state.history.len() == self.cfg.history_window {
                state.history.pop_front();
            }
            state.history.push_back(healthy);

            let new_status = if state.consecutive_failures >= self.cfg.unavailable_threshold {
                HealthStatus::Unavailable
            } else if state.consecutive_failures >= self.cfg.degraded_threshold {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            };

            let uptime_alert = match state.uptime() {
                Some(uptime)
                    if state.history.len() >= UPTIME_ALERT_MIN_CHECKS
                        && uptime < self.cfg.uptime_alert_threshold =>
                {
                    if state.alerted {
                        None
                    } else {
                        state.alerted = true;
                        Some(uptime)
                    }
                }
                _ => {
                    state.alerted = false;
                    None
                }
            };
            (new_status, uptime_alert)
        };

        let previous = self.registry.set_health(id, new_status, Utc::now());
        let _ = self.events.send(HealthEvent::CheckCompleted {
            model: id.to_string(),
            healthy,
            latency_ms,
        });
        if let Some(previous) = previous {
            if previous != new_status {
                TraceEvent::HealthTransition {
                    model: id.to_string(),
                    from: previous.to_string(),
                    to: new_status.to_string(),
                }
                .emit();
                let _ = self.events.send(HealthEvent::StatusChanged {
                    model: id.to_string(),
                    from: previous,
                    to: new_status,
                });
            }
        }
        if let Some(uptime) = uptime_alert {
            tracing::warn!(model = %id, uptime, "uptime below alert threshold");
            let _ = self.events.send(HealthEvent::UptimeAlert {
                model: id.to_string(),
                uptime,
            });
        }

        Ok(healthy)
    }

    /// Probe every active model once.
    pub async fn check_all(&self) {
        for model in self.registry.active_models() {
            if let Err(e) = self.check_model(&model.id).await {
                tracing::warn!(model = %model.id, error = %e, "health check failed to run");
            }
        }
    }

    /// Run the interval loop: an immediate sweep, then one per interval,
    /// until the token is cancelled.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let interval = Duration::from_secs(self.cfg.interval_secs);
            self.check_all().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => self.check_all().await,
                }
            }
        })
    }

    pub fn uptime(&self, id: &str) -> Option<f64> {
        self.states.lock().get(id).and_then(ModelHealthState::uptime)
    }

    /// Counts and mean uptime across active models.
    pub fn health_summary(&self) -> HealthSummary {
        let mut summary = HealthSummary::default();
        let mut uptimes = Vec::new();
        let states = self.states.lock();
        for model in self.registry.active_models() {
            match model.lifecycle.health_status {
                HealthStatus::Healthy => summary.healthy += 1,
                HealthStatus::Degraded => summary.degraded += 1,
                HealthStatus::Unavailable => summary.unavailable += 1,
            }
            if let Some(uptime) = states.get(&model.id).and_then(ModelHealthState::uptime) {
                uptimes.push(uptime);
            }
        }
        if !uptimes.is_empty() {
            summary.average_uptime = uptimes.iter().sum::<f64>() / uptimes.len() as f64;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use sy_registry::catalog::default_catalog;

    /// Probe that fails while the flag is set.
    struct FlakyProbe {
        failing: PlMutex<bool>,
    }

    #[async_trait::async_trait]
    impl HealthProbe for FlakyProbe {
        async fn probe(&self, _model: &ModelDescriptor) -> std::result::Result<(), BackendError> {
            if *self.failing.lock() {
                Err(BackendError::from_status(503, "down"))
            } else {
                Ok(())
            }
        }
    }

    fn make_checker(cfg: HealthConfig) -> (Arc<ModelRegistry>, Arc<FlakyProbe>, HealthChecker) {
        let registry = Arc::new(ModelRegistry::new(default_catalog()).unwrap());
        let probe = Arc::new(FlakyProbe {
            failing: PlMutex::new(false),
        });
        let checker = HealthChecker::new(Arc::clone(&registry), probe.clone(), cfg);
        (registry, probe, checker)
    }

    fn fast_config() -> HealthConfig {
        HealthConfig {
            timeout_secs: 1,
            ..HealthConfig::default()
        }
    }

    #[tokio::test]
    async fn thresholds_walk_degraded_then_unavailable() {
        let (registry, probe, checker) = make_checker(fast_config());
        let id = "gemini-2.5-flash";
        *probe.failing.lock() = true;

        checker.check_model(id).await.unwrap();
        assert_eq!(
            registry.get(id).unwrap().lifecycle.health_status,
            HealthStatus::Degraded
        );

        checker.check_model(id).await.unwrap();
        checker.check_model(id).await.unwrap();
        assert_eq!(
            registry.get(id).unwrap().lifecycle.health_status,
            HealthStatus::Unavailable
        );
    }

    #[tokio::test]
    async fn one_success_restores_healthy() {
        let (registry, probe, checker) = make_checker(fast_config());
        let id = "gemini-2.5-flash";
        *probe.failing.lock() = true;
        for _ in 0..3 {
            checker.check_model(id).await.unwrap();
        }
        *probe.failing.lock() = false;
        assert!(checker.check_model(id).await.unwrap());
        assert_eq!(
            registry.get(id).unwrap().lifecycle.health_status,
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn status_change_events_are_broadcast() {
        let (_, probe, checker) = make_checker(fast_config());
        let mut rx = checker.subscribe();
        *probe.failing.lock() = true;
        checker.check_model("gemini-2.5-flash").await.unwrap();

        let mut saw_change = false;
        while let Ok(ev) = rx.try_recv() {
            if let HealthEvent::StatusChanged { from, to, .. } = ev {
                assert_eq!(from, HealthStatus::Healthy);
                assert_eq!(to, HealthStatus::Degraded);
                saw_change = true;
            }
        }
        assert!(saw_change);
    }

    #[tokio::test]
    async fn uptime_alert_fires_once_below_threshold() {
        let (_, probe, checker) = make_checker(fast_config());
        let id = "gemini-2.5-flash";
        let mut rx = checker.subscribe();

        // 9 good checks, then failures dragging uptime under 0.95.
        for _ in 0..9 {
            checker.check_model(id).await.unwrap();
        }
        *probe.failing.lock() = true;
        checker.check_model(id).await.unwrap();
        checker.check_model(id).await.unwrap();

        let mut alerts = 0;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev, HealthEvent::UptimeAlert { .. }) {
                alerts += 1;
            }
        }
        assert_eq!(alerts, 1);
        assert!(checker.uptime(id).unwrap() < 0.95);
    }

    #[tokio::test]
    async fn unknown_model_is_an_error() {
        let (_, _, checker) = make_checker(fast_config());
        assert!(matches!(
            checker.check_model("ghost").await,
            Err(Error::UnknownModel(_))
        ));
    }

    #[tokio::test]
    async fn summary_counts_by_status() {
        let (_, probe, checker) = make_checker(fast_config());
        checker.check_all().await;
        let all_healthy = checker.health_summary();
        assert_eq!(all_healthy.degraded, 0);
        assert!(all_healthy.healthy >= 11);
        assert!((all_healthy.average_uptime - 1.0).abs() < f64::EPSILON);

        *probe.failing.lock() = true;
        checker.check_model("veo-3.1").await.unwrap();
        let one_down = checker.health_summary();
        assert_eq!(one_down.degraded, 1);
    }
}
