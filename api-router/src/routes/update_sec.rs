use axum::{
    extract::{rejection::FormRejection, State},
    response::IntoResponse,
    Form, Json,
};
use common::utils::ingest_limits::validate_update_text;
use serde::Deserialize;
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct UpdateForm {
    pub text: String,
}

/// Pushes free-form filing text into the secondary store only.
pub async fn update_sec(
    State(state): State<ApiState>,
    form: Result<Form<UpdateForm>, FormRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Form(form) = form?;
    validate_update_text(&state.config, &form.text)?;

    let added_chunks = state.ingestion.ingest_external_update(&form.text).await?;

    Ok(Json(json!({ "status": "ok", "added_chunks": added_chunks })))
}
