//! HTTP Error Types
//!
//! Maps application errors to status codes and a consistent JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inkwell_core::error::AppError;
use serde_json::json;

/// Error codes carried in the `code` field of error bodies
pub mod code {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CAPACITY_EXCEEDED: &str = "CAPACITY_EXCEEDED";
    pub const CONFLICT: &str = "CONFLICT";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Gateway-level error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An error from the orchestrator core
    #[error(transparent)]
    Core(#[from] AppError),

    /// A body that could not be read as JSON
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details: Option<Vec<String>> = None;

        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, code::INVALID_REQUEST, msg),
            ApiError::Core(core) => match core {
                AppError::InvalidRequest(errors) => {
                    details = Some(errors);
                    (
                        StatusCode::BAD_REQUEST,
                        code::INVALID_REQUEST,
                        "Request validation failed".to_string(),
                    )
                }
                AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, code::UNAUTHORIZED, msg),
                AppError::NotFound(msg) => (StatusCode::NOT_FOUND, code::NOT_FOUND, msg),
                e @ AppError::CapacityExceeded { .. } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    code::CAPACITY_EXCEEDED,
                    e.to_string(),
                ),
                AppError::AlreadyRunning(msg) => (StatusCode::CONFLICT, code::CONFLICT, msg),
                AppError::Domain(e) => (StatusCode::CONFLICT, code::CONFLICT, e.to_string()),
                other => {
                    tracing::error!(error = %other, "Internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        code::INTERNAL_ERROR,
                        INTERNAL_MESSAGE.to_string(),
                    )
                }
            },
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = json!(details);
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_core::domain::DomainError;

    fn status_of(err: AppError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(AppError::InvalidRequest(vec!["action: required".into()])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Unauthorized("log in".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AppError::NotFound("g9".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::CapacityExceeded { limit: 8 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(AppError::Domain(DomainError::InvalidStateTransition {
                from: "completed".into(),
                to: "running".into(),
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
