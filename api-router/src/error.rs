use axum::{
    extract::rejection::{FormRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{error::AppError, utils::ingest_limits::IngestValidationError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Upstream service error")]
    BadGateway(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => Self::ValidationError(msg),
            AppError::StoreNotFound(msg) => {
                tracing::warn!("Store unavailable: {msg}");
                Self::ServiceUnavailable(msg)
            }
            err if err.is_upstream() => {
                tracing::error!("Upstream error: {:?}", err);
                Self::BadGateway("Upstream service error".to_string())
            }
            err => {
                tracing::error!("Internal error: {:?}", err);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl From<IngestValidationError> for ApiError {
    fn from(err: IngestValidationError) -> Self {
        match err {
            IngestValidationError::PayloadTooLarge(msg) => Self::PayloadTooLarge(msg),
            IngestValidationError::BadRequest(msg) => Self::ValidationError(msg),
        }
    }
}

fn from_rejection(status: StatusCode, body: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(body)
    } else {
        ApiError::ValidationError(body)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InternalError(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            Self::ValidationError(message) => (StatusCode::BAD_REQUEST, message),
            Self::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            Self::ServiceUnavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            Self::BadGateway(message) => (StatusCode::BAD_GATEWAY, message),
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                status: "error".to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    // Helper to check status code
    fn assert_status_code<T: IntoResponse + Debug>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn test_app_error_to_api_error_conversion() {
        let validation = AppError::Validation("invalid input".to_string());
        let api_error = ApiError::from(validation);
        assert!(matches!(api_error, ApiError::ValidationError(msg) if msg == "invalid input"));

        let missing = AppError::StoreNotFound("primary store directory not found".to_string());
        let api_error = ApiError::from(missing);
        assert!(matches!(api_error, ApiError::ServiceUnavailable(_)));

        let upstream = AppError::Upstream("embedding timed out after 60s".to_string());
        let api_error = ApiError::from(upstream);
        assert!(matches!(api_error, ApiError::BadGateway(msg) if msg == "Upstream service error"));

        let internal_error =
            AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, "io error"));
        let api_error = ApiError::from(internal_error);
        assert!(matches!(api_error, ApiError::InternalError(_)));
    }

    #[test]
    fn test_ingest_validation_conversion() {
        let too_large = IngestValidationError::PayloadTooLarge("too big".into());
        assert!(matches!(ApiError::from(too_large), ApiError::PayloadTooLarge(_)));

        let bad = IngestValidationError::BadRequest("no files".into());
        assert!(matches!(ApiError::from(bad), ApiError::ValidationError(_)));
    }

    #[test]
    fn test_api_error_response_status_codes() {
        assert_status_code(
            ApiError::InternalError("server error".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        assert_status_code(
            ApiError::ValidationError("invalid input".to_string()),
            StatusCode::BAD_REQUEST,
        );
        assert_status_code(
            ApiError::PayloadTooLarge("too big".to_string()),
            StatusCode::PAYLOAD_TOO_LARGE,
        );
        assert_status_code(
            ApiError::ServiceUnavailable("store missing".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
        );
        assert_status_code(
            ApiError::BadGateway("upstream".to_string()),
            StatusCode::BAD_GATEWAY,
        );
    }

    #[test]
    fn test_rejection_status_mapping() {
        assert!(matches!(
            from_rejection(StatusCode::PAYLOAD_TOO_LARGE, "limit".into()),
            ApiError::PayloadTooLarge(_)
        ));
        assert!(matches!(
            from_rejection(StatusCode::UNPROCESSABLE_ENTITY, "missing field".into()),
            ApiError::ValidationError(_)
        ));
    }

    #[test]
    fn test_internal_error_sanitization() {
        let api_error = ApiError::InternalError("db password incorrect".to_string());

        assert_eq!(api_error.to_string(), "Internal server error");
        assert_status_code(api_error, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
