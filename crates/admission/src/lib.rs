//! Admission control: per-provider rate accounting, a priority queue for
//! throttled requests, and background drain workers that release queued
//! work when rate windows reset.

mod limiter;
mod queue;
mod report;

pub use limiter::{DrainOutcome, RateLimiter};
pub use queue::{QueueProcessor, QueuedRequest};
pub use report::{Alert, PeakSample, ProviderReport, StatisticsReport, Summary};
