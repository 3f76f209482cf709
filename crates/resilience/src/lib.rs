//! Failure handling: error classification, error statistics, the fallback
//! chain runner, and the periodic health checker.

pub mod fallback;
pub mod health;
pub mod report;
pub mod stats;

pub use fallback::{
    AttemptOutcome, AttemptRecord, CategoryReport, ChainOutcome, Executor, FallbackRunner,
    ModelChainStats,
};
pub use health::{HealthChecker, HealthEvent, HealthProbe, HealthSummary};
pub use report::{
    classify_backend_error, user_message, ClassifiedError, ErrorContext, RecoveryAction, Severity,
};
pub use stats::{ErrorStats, ErrorStatsSnapshot, RecentError};
