//! API error type and [`axum::response::IntoResponse`] implementation.

use actors::CoordinatorError;
use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::DbError;
use pigmap_core::CoreError;
use serde_json::json;
use storage::StorageError;

/// An error returned by an API handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("live coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::Db(DbError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            ApiError::Coordinator(CoordinatorError::InvalidEvent(_)) => StatusCode::BAD_REQUEST,
            ApiError::Db(_) | ApiError::Storage(_) | ApiError::Coordinator(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
