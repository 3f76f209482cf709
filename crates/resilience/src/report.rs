//! Structured classification of backend failures.
//!
//! Classification reads the typed fields of a `BackendError` (`kind`
//! first, then `status`); message text is never inspected.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sy_domain::{BackendError, ErrorCategory};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// What the fallback machinery should do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryAction {
    /// Retry the same model with backoff.
    Retry,
    /// Advance to the next model in the chain.
    Fallback,
    /// Park the request until capacity returns.
    Queue,
    /// Abort the whole chain.
    Reject,
    /// Serve a reduced answer. Reserved for collaborator subsystems.
    Degrade,
}

/// Where an error happened.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ErrorContext {
    pub request_id: Option<Uuid>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub attempt: u32,
    pub at: Option<DateTime<Utc>>,
}

/// A backend failure with its category, severity, and recovery decided.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub recovery: RecoveryAction,
    pub message: String,
    pub context: ErrorContext,
}

/// Derive the category from typed fields only.
fn categorize(err: &BackendError) -> ErrorCategory {
    if let Some(kind) = err.kind {
        return kind;
    }
    match err.status {
        Some(401) | Some(403) => ErrorCategory::AuthError,
        Some(429) => ErrorCategory::RateLimit,
        Some(s) if (500..600).contains(&s) => ErrorCategory::ModelUnavailable,
        _ => ErrorCategory::Unknown,
    }
}

pub fn severity_of(category: ErrorCategory) -> Severity {
    match category {
        ErrorCategory::RateLimit | ErrorCategory::Timeout => Severity::Medium,
        ErrorCategory::ModelUnavailable
        | ErrorCategory::AuthError
        | ErrorCategory::SafetyViolation => Severity::High,
        ErrorCategory::InvalidConfig | ErrorCategory::AllModelsFailed => Severity::Critical,
        ErrorCategory::Unknown => Severity::Medium,
    }
}

pub fn recovery_of(category: ErrorCategory) -> RecoveryAction {
    match category {
        ErrorCategory::Timeout => RecoveryAction::Retry,
        ErrorCategory::SafetyViolation | ErrorCategory::AllModelsFailed => RecoveryAction::Reject,
        ErrorCategory::ModelUnavailable
        | ErrorCategory::RateLimit
        | ErrorCategory::AuthError
        | ErrorCategory::InvalidConfig
        | ErrorCategory::Unknown => RecoveryAction::Fallback,
    }
}

/// Classify a backend failure in its request context.
pub fn classify_backend_error(err: &BackendError, mut context: ErrorContext) -> ClassifiedError {
    if context.at.is_none() {
        context.at = Some(Utc::now());
    }
    let category = categorize(err);
    ClassifiedError {
        category,
        severity: severity_of(category),
        recovery: recovery_of(category),
        message: err.message.clone(),
        context,
    }
}

/// The message shown to end users. Derived from the category only; raw
/// provider text never leaks through.
pub fn user_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::ModelUnavailable => {
            "The selected model is temporarily unavailable. Another model will handle your request."
        }
        ErrorCategory::RateLimit => {
            "The service is briefly over capacity. This resolves automatically; your request may be queued for a moment."
        }
        ErrorCategory::AuthError => {
            "A provider rejected our credentials. Your request is being rerouted."
        }
        ErrorCategory::Timeout => {
            "The model took too long to respond. It will be retried with a longer deadline."
        }
        ErrorCategory::SafetyViolation => {
            "The request was declined by the provider's safety system. Please rephrase and try again."
        }
        ErrorCategory::InvalidConfig => {
            "A configuration problem prevented this request from running."
        }
        ErrorCategory::AllModelsFailed => {
            "Every available model failed to answer. Please wait a moment and try again, or simplify the request."
        }
        ErrorCategory::Unknown => {
            "Something went wrong while handling the request. Another model will be tried."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_categories() {
        let cases = [
            (401, ErrorCategory::AuthError),
            (403, ErrorCategory::AuthError),
            (429, ErrorCategory::RateLimit),
            (500, ErrorCategory::ModelUnavailable),
            (503, ErrorCategory::ModelUnavailable),
            (418, ErrorCategory::Unknown),
        ];
        for (status, expected) in cases {
            let c = classify_backend_error(
                &BackendError::from_status(status, "x"),
                ErrorContext::default(),
            );
            assert_eq!(c.category, expected, "status {status}");
        }
    }

    #[test]
    fn explicit_kind_wins_over_status() {
        let err = BackendError {
            kind: Some(ErrorCategory::SafetyViolation),
            status: Some(400),
            message: "blocked".into(),
        };
        let c = classify_backend_error(&err, ErrorContext::default());
        assert_eq!(c.category, ErrorCategory::SafetyViolation);
        assert_eq!(c.recovery, RecoveryAction::Reject);
    }

    #[test]
    fn auth_errors_never_retry() {
        let c = classify_backend_error(
            &BackendError::from_status(401, "bad key"),
            ErrorContext::default(),
        );
        assert_ne!(c.recovery, RecoveryAction::Retry);
        assert_eq!(c.recovery, RecoveryAction::Fallback);
    }

    #[test]
    fn timeouts_retry() {
        let c = classify_backend_error(&BackendError::timeout("slow"), ErrorContext::default());
        assert_eq!(c.category, ErrorCategory::Timeout);
        assert_eq!(c.recovery, RecoveryAction::Retry);
    }

    #[test]
    fn user_messages_do_not_leak_provider_text() {
        let raw = "internal: key sk-1234 invalid";
        let c = classify_backend_error(
            &BackendError::from_status(401, raw),
            ErrorContext::default(),
        );
        assert!(!user_message(c.category).contains("sk-1234"));
    }
}
