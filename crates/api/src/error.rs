//! Unified error handling for the API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use credentials_core::ValidationErrors;

use crate::db::RepositoryError;
use crate::services::{IssuanceError, QueryError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Request fields failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Request body could not be read.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<IssuanceError> for AppError {
    fn from(err: IssuanceError) -> Self {
        match err {
            IssuanceError::Invalid(errors) => Self::Validation(errors),
            IssuanceError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Invalid(errors) => Self::Validation(errors),
            QueryError::InvalidPage => Self::NotFound(QueryError::InvalidPage.to_string()),
            QueryError::NotFound(_) => Self::NotFound("Not found.".to_string()),
            QueryError::Repository(e) => Self::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Database(_) => {
                let event_id = sentry::capture_error(&self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Credentials request error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error" })),
                )
                    .into_response()
            }
            Self::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            Self::NotFound(detail) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
            }
            Self::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use credentials_core::UserCredentialId;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Validation(ValidationErrors::single(
                "username",
                "This field is required."
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::BadRequest("JSON parse error".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(QueryError::InvalidPage.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(QueryError::NotFound(UserCredentialId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Unavailable(
                "down".to_string()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_invalid_page_message() {
        let AppError::NotFound(detail) = QueryError::InvalidPage.into() else {
            panic!("expected not found");
        };
        assert_eq!(detail, "Invalid page.");
    }
}
