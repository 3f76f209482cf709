use crate::queue::{insert_by_priority, QueueProcessor, QueuedRequest};
use crate::report::{Alert, PeakSample, ProviderReport, StatisticsReport, Summary};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sy_domain::config::LimitsConfig;
use sy_domain::model::RateLimit;
use sy_domain::trace::TraceEvent;
use sy_domain::{Error, Result};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const PEAK_RING_CAP: usize = 100;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-provider state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
struct ProviderRateState {
    requests_this_minute: u32,
    requests_today: u32,
    tokens_this_minute: u64,
    minute_reset_at: DateTime<Utc>,
    day_reset_at: DateTime<Utc>,
    total_requests: u64,
    throttled_requests: u64,
    total_wait_ms: u64,
    drained_requests: u64,
    peak_usage_times: VecDeque<PeakSample>,
    queue: Vec<QueuedRequest>,
}

impl ProviderRateState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            requests_this_minute: 0,
            requests_today: 0,
            tokens_this_minute: 0,
            minute_reset_at: now + Duration::seconds(60),
            day_reset_at: next_utc_midnight(now),
            total_requests: 0,
            throttled_requests: 0,
            total_wait_ms: 0,
            drained_requests: 0,
            peak_usage_times: VecDeque::new(),
            queue: Vec::new(),
        }
    }

    /// Lazily roll expired windows. Reset timestamps only move forward.
    fn roll(&mut self, now: DateTime<Utc>) {
        if now >= self.minute_reset_at {
            self.requests_this_minute = 0;
            self.tokens_this_minute = 0;
            self.minute_reset_at = now + Duration::seconds(60);
        }
        if now >= self.day_reset_at {
            self.requests_today = 0;
            self.day_reset_at = next_utc_midnight(now);
        }
    }

    fn utilization(&self, limits: &RateLimit) -> f64 {
        let minute = if limits.requests_per_minute > 0 {
            f64::from(self.requests_this_minute) / f64::from(limits.requests_per_minute)
        } else {
            0.0
        };
        let day = match limits.requests_per_day {
            Some(rpd) if rpd > 0 => f64::from(self.requests_today) / f64::from(rpd),
            _ => 0.0,
        };
        minute.max(day).clamp(0.0, 1.0)
    }

    fn can_execute(&self, limits: &RateLimit, estimated_tokens: u64) -> bool {
        if self.requests_this_minute >= limits.requests_per_minute {
            return false;
        }
        if let Some(rpd) = limits.requests_per_day {
            if self.requests_today >= rpd {
                return false;
            }
        }
        if let Some(tpm) = limits.tokens_per_minute {
            if estimated_tokens > 0 && self.tokens_this_minute + estimated_tokens > tpm {
                return false;
            }
        }
        true
    }
}

fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .unwrap_or(now + Duration::days(1))
}

struct ProviderEntry {
    limits: RateLimit,
    state: Mutex<ProviderRateState>,
    draining: AtomicBool,
}

/// What one drain pass accomplished.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainOutcome {
    pub processed: usize,
    pub failed: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rate limiter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-provider admission control with a bounded priority queue.
///
/// The provider set is fixed at construction; each provider's counters and
/// queue share one mutex, so requests against different providers never
/// contend on a lock.
pub struct RateLimiter {
    providers: HashMap<String, ProviderEntry>,
    queue_capacity: usize,
    peak_threshold: f64,
    alert_threshold: f64,
    processor: RwLock<Option<Arc<dyn QueueProcessor>>>,
}

impl RateLimiter {
    pub fn new(cfg: &LimitsConfig) -> Self {
        let now = Utc::now();
        let providers = cfg
            .providers
            .iter()
            .map(|(name, limits)| {
                (
                    name.clone(),
                    ProviderEntry {
                        limits: *limits,
                        state: Mutex::new(ProviderRateState::new(now)),
                        draining: AtomicBool::new(false),
                    },
                )
            })
            .collect();
        Self {
            providers,
            queue_capacity: cfg.queue_capacity,
            peak_threshold: cfg.peak_threshold,
            alert_threshold: cfg.alert_threshold,
            processor: RwLock::new(None),
        }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Register the callback the drain workers hand dequeued requests to.
    pub fn set_processor(&self, processor: Arc<dyn QueueProcessor>) {
        *self.processor.write() = Some(processor);
    }

    /// Whether a request against `provider` fits the current rate windows.
    /// Providers without configured limits are always admitted.
    pub fn can_execute(&self, provider: &str, estimated_tokens: u64) -> bool {
        let Some(entry) = self.providers.get(provider) else {
            return true;
        };
        let mut state = entry.state.lock();
        state.roll(Utc::now());
        state.can_execute(&entry.limits, estimated_tokens)
    }

    /// Account one executed request against the provider's windows.
    pub fn record_request(&self, provider: &str, tokens: u64) {
        let Some(entry) = self.providers.get(provider) else {
            return;
        };
        let now = Utc::now();
        let mut state = entry.state.lock();
        state.roll(now);
        state.requests_this_minute += 1;
        state.requests_today += 1;
        state.total_requests += 1;
        if tokens > 0 {
            state.tokens_this_minute += tokens;
        }
        let utilization = state.utilization(&entry.limits);
        if utilization >= self.peak_threshold {
            if state.peak_usage_times.len() == PEAK_RING_CAP {
                state.peak_usage_times.pop_front();
            }
            state.peak_usage_times.push_back(PeakSample {
                at: now,
                utilization,
            });
        }
    }

    /// `max(minute, day)` usage ratio, clamped to `[0, 1]`.
    pub fn utilization(&self, provider: &str) -> f64 {
        let Some(entry) = self.providers.get(provider) else {
            return 0.0;
        };
        let mut state = entry.state.lock();
        state.roll(Utc::now());
        state.utilization(&entry.limits)
    }

    // ── queue ──

    /// Park a request until the provider has budget again.
    pub fn enqueue(&self, provider: &str, estimated_tokens: u64, priority: u8) -> Result<Uuid> {
        let entry = self
            .providers
            .get(provider)
            .ok_or_else(|| Error::Config(format!("unknown provider {provider}")))?;
        let now = Utc::now();
        let mut state = entry.state.lock();
        state.roll(now);
        if state.queue.len() >= self.queue_capacity {
            return Err(Error::QueueFull {
                provider: provider.to_string(),
                capacity: self.queue_capacity,
            });
        }
        let request = QueuedRequest {
            id: Uuid::new_v4(),
            provider: provider.to_string(),
            estimated_tokens,
            priority,
            enqueued_at: now,
            estimated_execution_time: state.minute_reset_at,
        };
        let id = request.id;
        state.throttled_requests += 1;
        insert_by_priority(&mut state.queue, request);
        let queue_len = state.queue.len();
        let utilization = state.utilization(&entry.limits);
        drop(state);

        TraceEvent::RequestQueued {
            provider: provider.to_string(),
            priority,
            queue_len,
            utilization,
        }
        .emit();
        Ok(id)
    }

    /// Remove a request if it is still queued.
    pub fn cancel(&self, id: Uuid) -> bool {
        for entry in self.providers.values() {
            let mut state = entry.state.lock();
            if let Some(pos) = state.queue.iter().position(|q| q.id == id) {
                state.queue.remove(pos);
                return true;
            }
        }
        false
    }

    /// Milliseconds until the request's estimated execution time, clamped
    /// at zero. None when the request is no longer queued.
    pub fn estimated_wait(&self, id: Uuid) -> Option<u64> {
        let now = Utc::now();
        for entry in self.providers.values() {
            let state = entry.state.lock();
            if let Some(q) = state.queue.iter().find(|q| q.id == id) {
                let ms = (q.estimated_execution_time - now).num_milliseconds();
                return Some(ms.max(0) as u64);
            }
        }
        None
    }

    pub fn queue_len(&self, provider: Option<&str>) -> usize {
        match provider {
            Some(p) => self
                .providers
                .get(p)
                .map_or(0, |e| e.state.lock().queue.len()),
            None => self
                .providers
                .values()
                .map(|e| e.state.lock().queue.len())
                .sum(),
        }
    }

    /// Whether a provider's queue has no room left. Unknown providers
    /// report false (nothing to queue against).
    pub fn queue_is_full(&self, provider: &str) -> bool {
        self.providers
            .get(provider)
            .is_some_and(|e| e.state.lock().queue.len() >= self.queue_capacity)
    }

    pub fn queued_requests(&self, provider: Option<&str>) -> Vec<QueuedRequest> {
        match provider {
            Some(p) => self
                .providers
                .get(p)
                .map_or_else(Vec::new, |e| e.state.lock().queue.clone()),
            None => self
                .providers
                .values()
                .flat_map(|e| e.state.lock().queue.clone())
                .collect(),
        }
    }

    // ── draining ──

    /// Drain one provider's queue while rate budget holds. Single-flight:
    /// a concurrent call returns immediately with an empty outcome.
    pub async fn drain(&self, provider: &str) -> DrainOutcome {
        let Some(entry) = self.providers.get(provider) else {
            return DrainOutcome::default();
        };
        if entry
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return DrainOutcome::default();
        }

        let processor = self.processor.read().clone();
        let mut outcome = DrainOutcome::default();
        if let Some(processor) = processor {
            loop {
                let request = {
                    let now = Utc::now();
                    let mut state = entry.state.lock();
                    state.roll(now);
                    if state.queue.is_empty() {
                        break;
                    }
                    let tokens = state.queue[0].estimated_tokens;
                    if !state.can_execute(&entry.limits, tokens) {
                        break;
                    }
                    let request = state.queue.remove(0);
                    let waited = (now - request.enqueued_at).num_milliseconds().max(0) as u64;
                    state.total_wait_ms += waited;
                    state.drained_requests += 1;
                    request
                };
                match processor.process(&request).await {
                    Ok(()) => {
                        self.record_request(provider, request.estimated_tokens);
                        outcome.processed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            provider = %provider,
                            request_id = %request.id,
                            error = %e,
                            "queued request failed during drain; skipping"
                        );
                        outcome.failed += 1;
                    }
                }
            }
        } else {
            tracing::debug!(provider = %provider, "no queue processor registered; drain is a no-op");
        }

        entry.draining.store(false, Ordering::Release);
        outcome
    }

    /// Spawn one drain worker per provider; each wakes at that provider's
    /// minute reset, rolls the window, and drains.
    pub fn spawn_drain_workers(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        self.provider_names()
            .into_iter()
            .map(|provider| {
                let limiter = Arc::clone(self);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    loop {
                        let sleep_ms = limiter
                            .time_to_minute_reset(&provider)
                            .unwrap_or(60_000)
                            .max(10);
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)) => {}
                        }
                        limiter.reset_minute_window(&provider);
                        let outcome = limiter.drain(&provider).await;
                        if outcome.processed + outcome.failed > 0 {
                            TraceEvent::QueueDrained {
                                provider: provider.clone(),
                                processed: outcome.processed,
                                failed: outcome.failed,
                            }
                            .emit();
                        }
                    }
                })
            })
            .collect()
    }

    fn time_to_minute_reset(&self, provider: &str) -> Option<u64> {
        let entry = self.providers.get(provider)?;
        let state = entry.state.lock();
        let ms = (state.minute_reset_at - Utc::now()).num_milliseconds();
        Some(ms.max(0) as u64)
    }

    // ── window resets ──

    pub fn reset_minute_window(&self, provider: &str) {
        if let Some(entry) = self.providers.get(provider) {
            let mut state = entry.state.lock();
            state.requests_this_minute = 0;
            state.tokens_this_minute = 0;
            state.minute_reset_at = Utc::now() + Duration::seconds(60);
        }
    }

    pub fn reset_day_window(&self, provider: &str) {
        if let Some(entry) = self.providers.get(provider) {
            let mut state = entry.state.lock();
            state.requests_today = 0;
            state.day_reset_at = next_utc_midnight(Utc::now());
        }
    }

    // ── reporting ──

    /// Providers at or above the utilization threshold (config default
    /// when None).
    pub fn alerts(&self, threshold: Option<f64>) -> Vec<Alert> {
        let threshold = threshold.unwrap_or(self.alert_threshold);
        let mut alerts: Vec<Alert> = self
            .providers
            .iter()
            .filter_map(|(name, entry)| {
                let mut state = entry.state.lock();
                state.roll(Utc::now());
                let utilization = state.utilization(&entry.limits);
                (utilization >= threshold).then(|| Alert {
                    provider: name.clone(),
                    utilization,
                    queue_length: state.queue.len(),
                    message: format!(
                        "{name} at {:.0}% of its rate limit",
                        utilization * 100.0
                    ),
                })
            })
            .collect();
        alerts.sort_by(|a, b| b.utilization.total_cmp(&a.utilization));
        alerts
    }

    pub fn report(&self) -> StatisticsReport {
        let now = Utc::now();
        let mut providers: Vec<ProviderReport> = self
            .providers
            .iter()
            .map(|(name, entry)| {
                let mut state = entry.state.lock();
                state.roll(now);
                let average_wait_ms = if state.drained_requests > 0 {
                    state.total_wait_ms / state.drained_requests
                } else {
                    0
                };
                ProviderReport {
                    provider: name.clone(),
                    limits: entry.limits,
                    requests_this_minute: state.requests_this_minute,
                    requests_today: state.requests_today,
                    tokens_this_minute: state.tokens_this_minute,
                    utilization: state.utilization(&entry.limits),
                    queue_length: state.queue.len(),
                    total_requests: state.total_requests,
                    throttled_requests: state.throttled_requests,
                    average_wait_ms,
                    peak_samples: state.peak_usage_times.iter().copied().collect(),
                }
            })
            .collect();
        providers.sort_by(|a, b| a.provider.cmp(&b.provider));

        let total_requests = providers.iter().map(|p| p.total_requests).sum();
        let total_throttled = providers.iter().map(|p| p.throttled_requests).sum();
        let average_utilization = if providers.is_empty() {
            0.0
        } else {
            providers.iter().map(|p| p.utilization).sum::<f64>() / providers.len() as f64
        };
        let busiest_provider = providers
            .iter()
            .max_by(|a, b| a.utilization.total_cmp(&b.utilization))
            .map(|p| p.provider.clone());

        StatisticsReport {
            alerts: self.alerts(None),
            summary: Summary {
                total_requests,
                total_throttled,
                average_utilization,
                busiest_provider,
            },
            providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sy_domain::config::LimitsConfig;

    fn make_limits(rpm: u32, rpd: Option<u32>) -> LimitsConfig {
        let mut providers = HashMap::new();
        providers.insert(
            "groq".to_string(),
            RateLimit {
                requests_per_minute: rpm,
                requests_per_day: rpd,
                tokens_per_minute: None,
            },
        );
        LimitsConfig {
            providers,
            ..LimitsConfig::default()
        }
    }

    fn make_limiter(rpm: u32) -> RateLimiter {
        RateLimiter::new(&make_limits(rpm, None))
    }

    #[test]
    fn blocks_request_n_plus_one_until_reset() {
        let limiter = make_limiter(3);
        for _ in 0..3 {
            assert!(limiter.can_execute("groq", 0));
            limiter.record_request("groq", 0);
        }
        assert!(!limiter.can_execute("groq", 0));

        limiter.reset_minute_window("groq");
        assert!(limiter.can_execute("groq", 0));
    }

    #[test]
    fn utilization_is_max_of_minute_and_day() {
        let limiter = RateLimiter::new(&make_limits(10, Some(20)));
        for _ in 0..5 {
            limiter.record_request("groq", 0);
        }
        // minute: 5/10 = 0.5, day: 5/20 = 0.25.
        assert!((limiter.utilization("groq") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn day_limit_blocks_even_after_minute_reset() {
        let limiter = RateLimiter::new(&make_limits(100, Some(2)));
        limiter.record_request("groq", 0);
        limiter.record_request("groq", 0);
        limiter.reset_minute_window("groq");
        assert!(!limiter.can_execute("groq", 0));

        limiter.reset_day_window("groq");
        assert!(limiter.can_execute("groq", 0));
    }

    #[test]
    fn token_budget_respects_estimates() {
        let mut cfg = make_limits(100, None);
        if let Some(l) = cfg.providers.get_mut("groq") {
            l.tokens_per_minute = Some(1_000);
        }
        let limiter = RateLimiter::new(&cfg);
        limiter.record_request("groq", 900);
        assert!(limiter.can_execute("groq", 100));
        assert!(!limiter.can_execute("groq", 101));
        // A zero estimate is never token-blocked.
        assert!(limiter.can_execute("groq", 0));
    }

    #[test]
    fn unknown_provider_is_always_admitted() {
        let limiter = make_limiter(1);
        assert!(limiter.can_execute("nowhere", 0));
        assert_eq!(limiter.utilization("nowhere"), 0.0);
    }

    #[test]
    fn queue_orders_by_priority_and_enforces_capacity() {
        let mut cfg = make_limits(1, None);
        cfg.queue_capacity = 3;
        let limiter = RateLimiter::new(&cfg);

        limiter.enqueue("groq", 0, 1).unwrap();
        limiter.enqueue("groq", 0, 10).unwrap();
        limiter.enqueue("groq", 0, 5).unwrap();
        let priorities: Vec<u8> = limiter
            .queued_requests(Some("groq"))
            .iter()
            .map(|q| q.priority)
            .collect();
        assert_eq!(priorities, vec![10, 5, 1]);

        assert!(matches!(
            limiter.enqueue("groq", 0, 1),
            Err(Error::QueueFull { .. })
        ));
    }

    #[test]
    fn cancel_removes_only_queued_requests() {
        let limiter = make_limiter(1);
        let id = limiter.enqueue("groq", 0, 5).unwrap();
        assert!(limiter.estimated_wait(id).is_some());
        assert!(limiter.cancel(id));
        assert!(!limiter.cancel(id));
        assert_eq!(limiter.queue_len(Some("groq")), 0);
    }

    #[test]
    fn peak_ring_is_bounded() {
        let limiter = make_limiter(1);
        for _ in 0..150 {
            // Every recorded request is at 100% utilization for rpm=1.
            limiter.record_request("groq", 0);
            limiter.reset_minute_window("groq");
        }
        let report = limiter.report();
        let groq = report
            .providers
            .iter()
            .find(|p| p.provider == "groq")
            .unwrap();
        assert_eq!(groq.peak_samples.len(), PEAK_RING_CAP);
    }

    #[test]
    fn alerts_fire_at_threshold() {
        let limiter = RateLimiter::new(&make_limits(10, None));
        for _ in 0..9 {
            limiter.record_request("groq", 0);
        }
        let alerts = limiter.alerts(Some(0.8));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].provider, "groq");
        assert!(limiter.alerts(Some(0.95)).is_empty());
    }

    struct CountingProcessor {
        seen: Mutex<Vec<u8>>,
        fail_priority: Option<u8>,
    }

    #[async_trait::async_trait]
    impl QueueProcessor for CountingProcessor {
        async fn process(&self, request: &QueuedRequest) -> Result<()> {
            self.seen.lock().push(request.priority);
            if self.fail_priority == Some(request.priority) {
                return Err(Error::Other("boom".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn drain_processes_in_priority_order_and_skips_failures() {
        let limiter = make_limiter(10);
        let processor = Arc::new(CountingProcessor {
            seen: Mutex::new(Vec::new()),
            fail_priority: Some(5),
        });
        limiter.set_processor(processor.clone());

        limiter.enqueue("groq", 0, 1).unwrap();
        limiter.enqueue("groq", 0, 10).unwrap();
        limiter.enqueue("groq", 0, 5).unwrap();

        let outcome = limiter.drain("groq").await;
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(*processor.seen.lock(), vec![10, 5, 1]);
        assert_eq!(limiter.queue_len(Some("groq")), 0);
        // Only successful items count against the rate window.
        let report = limiter.report();
        assert_eq!(report.providers[0].requests_this_minute, 2);
    }

    #[tokio::test]
    async fn drain_stops_when_budget_runs_out() {
        let limiter = make_limiter(2);
        let processor = Arc::new(CountingProcessor {
            seen: Mutex::new(Vec::new()),
            fail_priority: None,
        });
        limiter.set_processor(processor);

        for p in [3, 2, 1] {
            limiter.enqueue("groq", 0, p).unwrap();
        }
        let outcome = limiter.drain("groq").await;
        assert_eq!(outcome.processed, 2);
        assert_eq!(limiter.queue_len(Some("groq")), 1);
    }
}
