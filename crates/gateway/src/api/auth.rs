//! Bearer-token middleware for the protected routes.
//!
//! The env var named by `config.server.token_env` is read **once at
//! startup** and its SHA-256 digest cached in `AppState`.
//! - When the var is set and non-empty, every protected request must carry
//!   `Authorization: Bearer <token>`.
//! - When it is unset or empty, the server logs a warning at startup and
//!   allows unauthenticated access (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// The token carried in the `Authorization` header, or `""` when the
/// header is absent or malformed. An empty token simply fails the hash
/// comparison below.
fn bearer_token(req: &Request<Body>) -> &str {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("")
}

/// Enforce bearer-token authentication. Attach to protected routes via
/// `axum::middleware::from_fn_with_state`.
pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.api_token_hash else {
        // Dev mode: no token configured.
        return next.run(req).await;
    };

    // Hashing first gives both sides a fixed length, so the constant-time
    // compare leaks neither content nor token length.
    let provided = Sha256::digest(bearer_token(&req).as_bytes());
    if bool::from(provided.ct_eq(expected.as_slice())) {
        next.run(req).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "invalid or missing API token" })),
        )
            .into_response()
    }
}
