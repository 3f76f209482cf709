//! The request pipeline: classify, route, execute.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use sy_domain::model::ModelParams;
use sy_domain::request::{
    Attachment, ChatMessage, ClassificationRequest, GenerateRequest, RoutingRequest,
};

use super::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub message: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
    #[serde(default)]
    pub params: Option<ModelParams>,
}

impl GenerateBody {
    fn classification_request(&self) -> ClassificationRequest {
        ClassificationRequest {
            user_message: self.message.clone(),
            attachments: self.attachments.clone(),
            conversation_history: self.conversation_history.clone(),
        }
    }
}

/// `POST /v1/generate` — the full pipeline. Classifies the message, picks
/// a chain, and walks it until a model answers.
pub async fn generate(State(state): State<AppState>, Json(body): Json<GenerateBody>) -> Response {
    let classification = state.classifier.classify(&body.classification_request()).await;

    let decision = match state.router.route(&RoutingRequest {
        classification: classification.clone(),
        user_message: body.message.clone(),
        conversation_history: body.conversation_history.clone(),
    }) {
        Ok(d) => d,
        Err(e) => return error_response(&e),
    };

    let mut chain = Vec::with_capacity(1 + decision.fallback_chain.len());
    chain.push(decision.selected_model.clone());
    chain.extend(decision.fallback_chain.iter().cloned());

    let request = GenerateRequest {
        prompt: body.message,
        system_prompt: body.system_prompt,
        history: body.conversation_history,
        params: body.params,
    };

    match state
        .runner
        .execute_with_fallback(&request, &chain, decision.category, state.executor.as_ref())
        .await
    {
        Ok(outcome) => Json(serde_json::json!({
            "text": outcome.response.text,
            "model_used": outcome.model_used,
            "provider": outcome.provider,
            "category": decision.category,
            "routing_reason": decision.routing_reason,
            "fallback_depth": outcome.fallback_depth,
            "attempts": outcome.attempts,
            "total_latency_ms": outcome.total_latency_ms,
            "usage": outcome.response.usage,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /v1/classify` — classification only, no routing side effects.
pub async fn classify(
    State(state): State<AppState>,
    Json(body): Json<ClassificationRequest>,
) -> Response {
    let classification = state.classifier.classify(&body).await;
    Json(classification).into_response()
}

/// `POST /v1/route` — dry-run: classify and decide, but execute nothing.
/// The decision still counts toward routing statistics.
pub async fn route_dry_run(
    State(state): State<AppState>,
    Json(body): Json<ClassificationRequest>,
) -> Response {
    let classification = state.classifier.classify(&body).await;
    match state.router.route(&RoutingRequest {
        classification: classification.clone(),
        user_message: body.user_message,
        conversation_history: body.conversation_history,
    }) {
        Ok(decision) => Json(serde_json::json!({
            "classification": classification,
            "decision": decision,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
