//! Admission, routing, and error statistics endpoints.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

/// `GET /v1/limits` — the full per-provider statistics report.
pub async fn limits_report(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.limiter.report())
}

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Utilization threshold override; the configured alert threshold
    /// applies when absent.
    pub threshold: Option<f64>,
}

/// `GET /v1/limits/alerts` — providers above the alert threshold.
pub async fn limit_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> impl IntoResponse {
    let alerts = state.limiter.alerts(query.threshold);
    Json(serde_json::json!({
        "count": alerts.len(),
        "alerts": alerts,
    }))
}

/// `GET /v1/routing/stats` — router decision counters.
pub async fn routing_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.router.stats();
    Json(serde_json::json!({
        "fallback_rate": stats.fallback_rate(),
        "stats": stats,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

/// `GET /v1/errors/recent` — the recent-error ring plus aggregate counts.
pub async fn recent_errors(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50);
    Json(serde_json::json!({
        "recent": state.error_stats.recent(limit),
        "totals": state.error_stats.snapshot(),
    }))
}
