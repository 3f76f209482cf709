use serde::{Deserialize, Serialize};
use std::fmt;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error categories
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Coarse classification of a backend failure, used to pick a recovery
/// strategy and to aggregate error statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    ModelUnavailable,
    RateLimit,
    AuthError,
    Timeout,
    SafetyViolation,
    InvalidConfig,
    AllModelsFailed,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ModelUnavailable => "MODEL_UNAVAILABLE",
            Self::RateLimit => "RATE_LIMIT",
            Self::AuthError => "AUTH_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::SafetyViolation => "SAFETY_VIOLATION",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::AllModelsFailed => "ALL_MODELS_FAILED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A failure reported by a model backend.
///
/// Adapters populate `kind` and/or `status` when the transport gives them
/// structured information (HTTP status, a typed timeout). Classification
/// downstream relies on those fields, never on parsing `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendError {
    /// Structured category, when the adapter could determine one.
    pub kind: Option<ErrorCategory>,
    /// HTTP status code, when the failure came from an HTTP response.
    pub status: Option<u16>,
    /// Human-readable detail. Informational only.
    pub message: String,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(s) => write!(f, "backend error (status {s}): {}", self.message),
            None => write!(f, "backend error: {}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}

impl BackendError {
    /// Failure derived from an HTTP status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: None,
            status: Some(status),
            message: message.into(),
        }
    }

    /// A typed timeout (deadline elapsed before the backend responded).
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: Some(ErrorCategory::Timeout),
            status: None,
            message: message.into(),
        }
    }

    /// A failure with an explicit category and no HTTP status.
    pub fn of_kind(kind: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            status: None,
            message: message.into(),
        }
    }

    /// A fully untyped failure (connection reset, malformed body, ...).
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            status: None,
            message: message.into(),
        }
    }
}

/// One failed attempt within an exhausted fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub model_id: String,
    pub message: String,
}

fn fmt_attempts(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(|a| format!("{} ({})", a.model_id, a.message))
        .collect::<Vec<_>>()
        .join(", ")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("no available models for category {category}")]
    NoAvailableModels { category: String },

    #[error("all models in fallback chain failed: {}", fmt_attempts(attempts))]
    AllModelsFailed { attempts: Vec<AttemptFailure> },

    #[error("queue full for provider {provider} ({capacity} waiting)")]
    QueueFull { provider: String, capacity: usize },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The category this error maps to, for reporting surfaces.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Backend(b) => b.kind.unwrap_or(ErrorCategory::Unknown),
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Config(_) => ErrorCategory::InvalidConfig,
            Self::UnknownModel(_) | Self::NoAvailableModels { .. } => {
                ErrorCategory::ModelUnavailable
            }
            Self::AllModelsFailed { .. } => ErrorCategory::AllModelsFailed,
            Self::QueueFull { .. } => ErrorCategory::RateLimit,
            Self::Auth(_) => ErrorCategory::AuthError,
            _ => ErrorCategory::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_models_failed_lists_every_attempt() {
        let err = Error::AllModelsFailed {
            attempts: vec![
                AttemptFailure {
                    model_id: "gemini-2.5-flash".into(),
                    message: "status 503".into(),
                },
                AttemptFailure {
                    model_id: "cerebras-llama-3.3-70b".into(),
                    message: "timeout".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("gemini-2.5-flash"));
        assert!(msg.contains("cerebras-llama-3.3-70b"));
    }

    #[test]
    fn backend_error_display_includes_status() {
        let err = BackendError::from_status(429, "too many requests");
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn error_category_mapping() {
        assert_eq!(
            Error::Timeout("t".into()).category(),
            ErrorCategory::Timeout
        );
        assert_eq!(Error::Auth("a".into()).category(), ErrorCategory::AuthError);
        assert_eq!(
            Error::Backend(BackendError::unknown("x")).category(),
            ErrorCategory::Unknown
        );
    }
}
