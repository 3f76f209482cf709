use crate::model::{Complexity, ModelParams, TaskCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound request shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What kind of payload an attachment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Audio,
    Video,
    Document,
}

/// A non-text payload attached to a request. Only the shape matters for
/// classification; the bytes themselves never pass through the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The input to task classification.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassificationRequest {
    pub user_message: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classification output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The classifier's verdict for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: TaskCategory,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
    pub estimated_complexity: Complexity,
    /// Rough token demand used for latency estimation and admission.
    pub estimated_tokens: u64,
    pub requires_multimodal: bool,
    /// ISO-639-1 language code of the user message, best effort.
    pub detected_language: String,
    pub classified_at: DateTime<Utc>,
    /// Identifier of whatever produced this verdict (a remote model id, or
    /// `fallback-rules` for the offline heuristics).
    pub classifier_model: String,
}

/// A classified request ready for routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub classification: Classification,
    pub user_message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A request handed to a model backend for execution.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub params: Option<ModelParams>,
}

/// Token accounting reported by a backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    /// Internal id of the model that actually answered.
    pub model_used: String,
    #[serde(default)]
    pub usage: Option<Usage>,
}
