//! Health & Readiness Routes

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::api::server::SharedAppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `/ready` additionally checks the store can answer for the tree this
/// process serves; a failure here means the process should not be receiving
/// traffic yet (or any more).
pub async fn ready(State(state): State<SharedAppState>) -> impl IntoResponse {
    match state.tree.depth().await {
        Ok(_) => (StatusCode::OK, Json(HealthResponse { status: "ready" })).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { status: "not_ready" })).into_response(),
    }
}
