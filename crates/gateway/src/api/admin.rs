//! Operator actions: retiring models and restoring auth-blocked providers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct KillBody {
    /// Model id routed to in place of the dead one.
    #[serde(default)]
    pub replacement: Option<String>,
}

/// `POST /v1/admin/models/:id/kill` — mark a model DEAD immediately.
pub async fn kill_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<KillBody>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    if !state.registry.mark_dead(&id, body.replacement.clone()) {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("unknown model: {id}") })),
        )
            .into_response();
    }
    tracing::info!(model = %id, replacement = ?body.replacement, "model killed by operator");
    Json(serde_json::json!({
        "killed": id,
        "replacement": body.replacement,
    }))
    .into_response()
}

/// `POST /v1/admin/providers/:provider/restore` — lift the process-wide
/// unavailable mark set after an auth failure.
pub async fn restore_provider(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> impl IntoResponse {
    let restored = state.runner.mark_provider_available(&provider);
    if restored {
        tracing::info!(provider = %provider, "provider restored by operator");
    }
    Json(serde_json::json!({
        "provider": provider,
        "restored": restored,
        "still_unavailable": state.runner.unavailable_providers(),
    }))
}
