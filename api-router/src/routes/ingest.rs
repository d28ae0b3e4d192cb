use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use common::{error::AppError, utils::ingest_limits::validate_upload};
use ingestion_pipeline::loader::document_from_bytes;
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

const UNNAMED_UPLOAD: &str = "upload";

#[derive(Debug, TryFromMultipart)]
pub struct IngestParams {
    #[form_data(field_name = "file", limit = "unlimited")]
    #[form_data(default)]
    pub files: Vec<FieldData<NamedTempFile>>,
}

pub async fn ingest_documents(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<IngestParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_count = input.files.len();
    info!(file_count, "Received ingestion request");

    validate_upload(&state.config, file_count)?;

    let mut documents = Vec::with_capacity(file_count);
    for file in input.files {
        let source = file
            .metadata
            .file_name
            .clone()
            .unwrap_or_else(|| UNNAMED_UPLOAD.to_string());
        let bytes = tokio::fs::read(file.contents.path())
            .await
            .map_err(AppError::from)?;
        documents.push(document_from_bytes(bytes, &source)?);
    }

    let report = state.ingestion.ingest_documents(documents).await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "status": "ok", "chunks": report.chunks })),
    ))
}
