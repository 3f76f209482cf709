//! Aggregated error accounting across all chains.

use crate::report::ClassifiedError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use sy_domain::ErrorCategory;

const RECENT_RING_CAP: usize = 100;
const DEFAULT_ALERT_THRESHOLD: f64 = 0.05;

/// One entry of the recent-error ring.
#[derive(Debug, Clone, Serialize)]
pub struct RecentError {
    pub at: DateTime<Utc>,
    pub category: ErrorCategory,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub message: String,
}

#[derive(Debug, Default)]
struct Inner {
    total_errors: u64,
    by_category: HashMap<ErrorCategory, u64>,
    by_model: HashMap<String, u64>,
    by_provider: HashMap<String, u64>,
    attempts_by_model: HashMap<String, u64>,
    recent: VecDeque<RecentError>,
}

/// Snapshot served over the API.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorStatsSnapshot {
    pub total_errors: u64,
    pub by_category: HashMap<ErrorCategory, u64>,
    pub by_model: HashMap<String, u64>,
    pub by_provider: HashMap<String, u64>,
}

/// Thread-safe error statistics with a bounded recent-error ring.
#[derive(Default)]
pub struct ErrorStats {
    inner: Mutex<Inner>,
}

impl ErrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one attempt against a model, error or not. Error rates are
    /// errors over attempts.
    pub fn record_attempt(&self, model: &str) {
        *self
            .inner
            .lock()
            .attempts_by_model
            .entry(model.to_string())
            .or_default() += 1;
    }

    pub fn record(&self, error: &ClassifiedError) {
        let mut inner = self.inner.lock();
        inner.total_errors += 1;
        *inner.by_category.entry(error.category).or_default() += 1;
        if let Some(model) = &error.context.model {
            *inner.by_model.entry(model.clone()).or_default() += 1;
        }
        if let Some(provider) = &error.context.provider {
            *inner.by_provider.entry(provider.clone()).or_default() += 1;
        }
        if inner.recent.len() == RECENT_RING_CAP {
            inner.recent.pop_front();
        }
        inner.recent.push_back(RecentError {
            at: error.context.at.unwrap_or_else(Utc::now),
            category: error.category,
            model: error.context.model.clone(),
            provider: error.context.provider.clone(),
            message: error.message.clone(),
        });
    }

    /// Errors over attempts for one model; 0.0 when never attempted.
    pub fn error_rate(&self, model: &str) -> f64 {
        let inner = self.inner.lock();
        let attempts = inner.attempts_by_model.get(model).copied().unwrap_or(0);
        if attempts == 0 {
            return 0.0;
        }
        let errors = inner.by_model.get(model).copied().unwrap_or(0);
        errors as f64 / attempts as f64
    }

    pub fn should_alert(&self, model: &str, threshold: Option<f64>) -> bool {
        self.error_rate(model) > threshold.unwrap_or(DEFAULT_ALERT_THRESHOLD)
    }

    /// Most recent errors, newest last, at most `limit`.
    pub fn recent(&self, limit: usize) -> Vec<RecentError> {
        let inner = self.inner.lock();
        inner
            .recent
            .iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> ErrorStatsSnapshot {
        let inner = self.inner.lock();
        ErrorStatsSnapshot {
            total_errors: inner.total_errors,
            by_category: inner.by_category.clone(),
            by_model: inner.by_model.clone(),
            by_provider: inner.by_provider.clone(),
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{classify_backend_error, ErrorContext};
    use sy_domain::BackendError;

    fn make_error(model: &str, status: u16) -> ClassifiedError {
        classify_backend_error(
            &BackendError::from_status(status, "x"),
            ErrorContext {
                model: Some(model.into()),
                provider: Some("groq".into()),
                ..ErrorContext::default()
            },
        )
    }

    #[test]
    fn recent_ring_is_bounded_at_100() {
        let stats = ErrorStats::new();
        for _ in 0..150 {
            stats.record(&make_error("m", 500));
        }
        assert_eq!(stats.recent(usize::MAX).len(), 100);
        assert_eq!(stats.snapshot().total_errors, 150);
    }

    #[test]
    fn error_rate_is_errors_over_attempts() {
        let stats = ErrorStats::new();
        for _ in 0..20 {
            stats.record_attempt("m");
        }
        stats.record(&make_error("m", 500));

        assert!((stats.error_rate("m") - 0.05).abs() < 1e-9);
        assert!(!stats.should_alert("m", None)); // exactly at threshold
        stats.record(&make_error("m", 500));
        assert!(stats.should_alert("m", None));
    }

    #[test]
    fn unattempted_model_never_alerts() {
        let stats = ErrorStats::new();
        assert_eq!(stats.error_rate("ghost"), 0.0);
        assert!(!stats.should_alert("ghost", None));
    }
}
