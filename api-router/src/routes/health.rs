use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use common::storage::vector_store::VectorStore;
use serde_json::{json, Map, Value};

use crate::api_state::ApiState;

/// Liveness probe: the process is up and serving requests.
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn store_check(store: &dyn VectorStore) -> (bool, Value) {
    match store.count().await {
        Ok(chunks) => (true, json!({ "status": "ok", "chunks": chunks })),
        Err(err) => (false, json!({ "status": "fail", "reason": err.to_string() })),
    }
}

/// Readiness probe: 200 once both vector stores exist on disk, else 503.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let (primary_ok, primary) = store_check(state.primary.as_ref()).await;
    let (secondary_ok, secondary) = store_check(state.secondary.as_ref()).await;

    let mut checks = Map::new();
    checks.insert(state.primary.name().to_string(), primary);
    checks.insert(state.secondary.name().to_string(), secondary);

    if primary_ok && secondary_ok {
        (
            StatusCode::OK,
            Json(json!({ "status": "ok", "checks": checks })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "checks": checks })),
        )
    }
}
