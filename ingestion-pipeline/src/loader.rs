use std::path::Path;

use common::{error::AppError, storage::types::document::Document};
use tracing::debug;

/// Builds a document from uploaded bytes, tagging it with `source`.
///
/// Bytes must be valid UTF-8 and contain at least one non-whitespace character.
pub fn document_from_bytes(bytes: Vec<u8>, source: &str) -> Result<Document, AppError> {
    let text = String::from_utf8(bytes)
        .map_err(|_| AppError::Validation(format!("{source} is not valid UTF-8 text")))?;
    document_from_text(text, source)
}

pub fn document_from_text(text: String, source: &str) -> Result<Document, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(format!("{source} contains no text")));
    }
    debug!(source, chars = text.chars().count(), "Loaded document");
    Ok(Document::from_source(text, source))
}

/// Reads a plain text file; the source is recorded as the path as given.
pub async fn load_text_file(path: &Path) -> Result<Document, AppError> {
    let bytes = tokio::fs::read(path).await?;
    document_from_bytes(bytes, &path.display().to_string())
}
