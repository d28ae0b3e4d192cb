use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use retrieval_pipeline::QueryOutcome;
use serde::Deserialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

pub async fn answer_query(
    State(state): State<ApiState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryOutcome>, ApiError> {
    let Json(request) = payload?;
    info!(query_chars = request.query.chars().count(), "Received query");

    let outcome = state.query.answer(&request.query).await?;
    Ok(Json(outcome))
}
