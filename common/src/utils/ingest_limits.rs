use super::config::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestValidationError {
    PayloadTooLarge(String),
    BadRequest(String),
}

/// Checks an upload against the configured file count.
pub fn validate_upload(config: &AppConfig, file_count: usize) -> Result<(), IngestValidationError> {
    if file_count == 0 {
        return Err(IngestValidationError::BadRequest(
            "At least one file is required".to_string(),
        ));
    }

    if file_count > config.ingest_max_files {
        return Err(IngestValidationError::BadRequest(format!(
            "Too many files. Maximum allowed is {}",
            config.ingest_max_files
        )));
    }

    Ok(())
}

/// Checks free-form update text before it is chunked.
pub fn validate_update_text(config: &AppConfig, text: &str) -> Result<(), IngestValidationError> {
    if text.trim().is_empty() {
        return Err(IngestValidationError::BadRequest(
            "Update text must not be empty".to_string(),
        ));
    }

    if text.len() > config.update_max_text_bytes {
        return Err(IngestValidationError::PayloadTooLarge(format!(
            "Update text is too large. Maximum allowed is {} bytes",
            config.update_max_text_bytes
        )));
    }

    Ok(())
}
