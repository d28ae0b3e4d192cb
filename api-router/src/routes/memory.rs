use axum::{extract::State, Json};
use common::storage::memory_log::MemoryDocument;

use crate::api_state::ApiState;

pub async fn memory_snapshot(State(state): State<ApiState>) -> Json<MemoryDocument> {
    Json(state.memory.snapshot().await)
}
