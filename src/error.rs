use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Failures surfaced by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The score store failed while serving the request.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No score store is installed yet.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The request is malformed or names something inconsistent.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The match or leg is not in a state that allows the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// A concurrent writer won a uniqueness race and retries were exhausted.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UniqueViolation { constraint } => {
                ServiceError::Conflict(format!("unique constraint `{constraint}` violated"))
            }
            other => ServiceError::Unavailable(other),
        }
    }
}

/// Errors rendered as HTTP responses with a `{ "error", "message" }` body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    /// The request lost against the current match state or a concurrent write.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// HTTP status the error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => {
                AppError::ServiceUnavailable("score store unavailable (degraded mode)".into())
            }
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) | ServiceError::Conflict(message) => {
                AppError::Conflict(message)
            }
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {err}"))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violations_surface_as_conflicts() {
        let err: ServiceError = StorageError::UniqueViolation {
            constraint: "turns_leg_id_turn_number_key",
        }
        .into();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let app = AppError::from(err);
        assert_eq!(app.kind(), "conflict");
        assert_eq!(app.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn degraded_mode_maps_to_service_unavailable() {
        let response = AppError::from(ServiceError::Degraded).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn leg_state_errors_are_conflicts() {
        let app = AppError::from(ServiceError::InvalidState("leg already won".into()));
        assert_eq!(app.status(), StatusCode::CONFLICT);
        assert_eq!(app.to_string(), "leg already won");
    }
}
