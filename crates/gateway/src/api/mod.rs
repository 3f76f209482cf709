pub mod admin;
pub mod auth;
pub mod generate;
pub mod limits;
pub mod models;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use sy_domain::{Error, ErrorCategory};
use sy_resilience::user_message;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the bearer-token middleware).
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/readiness", get(models::readiness));

    let protected = Router::new()
        // Request pipeline
        .route("/v1/generate", post(generate::generate))
        .route("/v1/classify", post(generate::classify))
        .route("/v1/route", post(generate::route_dry_run))
        // Registry
        .route("/v1/models", get(models::list_models))
        .route("/v1/models/:id/stats", get(models::model_stats))
        .route("/v1/registry/stats", get(models::registry_stats))
        // Admission
        .route("/v1/limits", get(limits::limits_report))
        .route("/v1/limits/alerts", get(limits::limit_alerts))
        // Health & resilience
        .route("/v1/health/models", get(models::health_models))
        .route("/v1/routing/stats", get(limits::routing_stats))
        .route("/v1/chains/:category", get(models::chain_report))
        .route("/v1/errors/recent", get(limits::recent_errors))
        // Admin
        .route("/v1/admin/models/:id/kill", post(admin::kill_model))
        .route(
            "/v1/admin/providers/:provider/restore",
            post(admin::restore_provider),
        )
        // Apply API auth middleware to all protected routes.
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}

/// Map a workspace error onto an HTTP response. The body carries the
/// category, a category-derived user message, and the technical detail.
pub(crate) fn error_response(err: &Error) -> Response {
    let category = err.category();
    let status = match category {
        ErrorCategory::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::InvalidConfig => StatusCode::BAD_REQUEST,
        ErrorCategory::AuthError => StatusCode::BAD_GATEWAY,
        ErrorCategory::SafetyViolation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::ModelUnavailable | ErrorCategory::AllModelsFailed => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorCategory::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({
            "error": user_message(category),
            "category": category,
            "detail": err.to_string(),
        })),
    )
        .into_response()
}
