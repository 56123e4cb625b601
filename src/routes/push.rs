// POST /command: pushed task batches, bypassing the control-plane queue

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::IntoResponse;
use serde_json::json;

use super::AppState;
use crate::models::PushPayload;
use crate::version::{NAME, VERSION};

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// POST /command — apply a pushed task batch directly. Accepts a single
/// task, `{"tasks": [...]}`, or a bare array. The shared token is checked
/// by exact match before the body is even parsed; malformed payloads and
/// empty key ids get a 400, never a partial apply.
pub(super) async fn command_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    if !authorized(&headers, &state.token) {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"ok": false, "error": "unauthorized"})),
        );
    }

    let payload: PushPayload = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({"ok": false, "error": "invalid payload"})),
            );
        }
    };
    let ops = match payload.into_ops() {
        Ok(ops) => ops,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({"ok": false, "error": e.to_string()})),
            );
        }
    };

    match state.mutator.apply(&ops).await {
        Ok(outcome) => (
            StatusCode::OK,
            axum::Json(json!({"ok": true, "changed": outcome.changed})),
        ),
        Err(e) => {
            tracing::error!(error = %e, operation = "push_apply", "pushed batch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({"ok": false, "error": "apply failed"})),
            )
        }
    }
}

fn authorized(headers: &HeaderMap, token: &str) -> bool {
    let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(presented) = value.strip_prefix("Bearer ") else {
        return false;
    };
    presented == token
}
