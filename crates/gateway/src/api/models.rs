//! Registry, health, and chain introspection endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use sy_domain::model::TaskCategory;

use crate::state::AppState;

/// `GET /v1/readiness` — public liveness probe.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

/// `GET /v1/models` — every routable model, sorted by id.
pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    let mut models = state.registry.active_models();
    models.sort_by(|a, b| a.id.cmp(&b.id));
    Json(serde_json::json!({
        "count": models.len(),
        "models": models,
    }))
}

/// `GET /v1/models/:id/stats` — usage, chain, and health detail for one model.
pub async fn model_stats(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(model) = state.registry.get(&id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("unknown model: {id}") })),
        )
            .into_response();
    };

    let usage = state.registry.usage_stats(&id);
    let chain = state.runner.model_stats().get(&id).copied();
    Json(serde_json::json!({
        "model": model,
        "usage": usage,
        "chain": chain,
        "error_rate": state.error_stats.error_rate(&id),
        "uptime": state.checker.uptime(&id),
    }))
    .into_response()
}

/// `GET /v1/registry/stats` — lifecycle and health counts.
pub async fn registry_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.registry_stats())
}

/// `GET /v1/health/models` — checker summary plus per-model detail.
pub async fn health_models(State(state): State<AppState>) -> impl IntoResponse {
    let mut models = state.registry.active_models();
    models.sort_by(|a, b| a.id.cmp(&b.id));
    let detail: Vec<serde_json::Value> = models
        .iter()
        .map(|m| {
            serde_json::json!({
                "id": m.id,
                "provider": m.provider,
                "health_status": m.lifecycle.health_status,
                "last_health_check": m.lifecycle.last_health_check,
                "uptime": state.checker.uptime(&m.id),
            })
        })
        .collect();
    Json(serde_json::json!({
        "summary": state.checker.health_summary(),
        "models": detail,
    }))
}

/// `GET /v1/chains/:category` — chain performance and the configured rule.
pub async fn chain_report(State(state): State<AppState>, Path(category): Path<String>) -> Response {
    let Some(category) = parse_category(&category) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": format!("unknown category: {category}") })),
        )
            .into_response();
    };
    Json(serde_json::json!({
        "report": state.runner.category_report(category),
        "rule": state.router.rule_for(category),
    }))
    .into_response()
}

fn parse_category(s: &str) -> Option<TaskCategory> {
    serde_json::from_value(serde_json::Value::String(s.to_uppercase())).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_path_segment_parses_case_insensitively() {
        assert_eq!(parse_category("CODING"), Some(TaskCategory::Coding));
        assert_eq!(parse_category("long_context"), Some(TaskCategory::LongContext));
        assert_eq!(parse_category("bogus"), None);
    }
}
