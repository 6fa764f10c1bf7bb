use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness probe: returns 200 once a model bundle is loaded, else 503.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    match state.recommender.bundle() {
        Some(bundle) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "checks": { "model": "ok" },
                "books": bundle.len()
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "checks": { "model": "fail" },
                "reason": "model bundle is not loaded"
            })),
        ),
    }
}
