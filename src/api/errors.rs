use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::link_store::LinkStoreError;
use crate::services::test_session::NOT_FOUND_OR_EXPIRED;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<LinkStoreError> for ApiError {
    fn from(err: LinkStoreError) -> Self {
        match err {
            LinkStoreError::Validation(message) => ApiError::BadRequest(message),
            LinkStoreError::NotFoundOrExpired => ApiError::NotFound(NOT_FOUND_OR_EXPIRED.to_string()),
            LinkStoreError::Transient(err) => {
                tracing::warn!(error = %format!("{err:#}"), "Link store operation failed");
                ApiError::ServiceUnavailable(
                    "Storage is temporarily unavailable. Please try again.".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, message)
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
    }
}
