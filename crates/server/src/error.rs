//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("upload failed: {0}")]
    Upload(#[from] stash_storage::StorageError),

    #[error("upload timed out after {0} seconds")]
    UploadTimedOut(u64),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("store error: {0}")]
    Store(stash_store::StoreError),

    #[error("core error: {0}")]
    Core(#[from] stash_core::Error),
}

impl From<stash_store::StoreError> for ApiError {
    fn from(err: stash_store::StoreError) -> Self {
        match err {
            // An unknown upload id is the caller's problem, not ours.
            stash_store::StoreError::NotFound(id) => {
                Self::NotFound(format!("upload session not found: {id}"))
            }
            other => Self::Store(other),
        }
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Upload(_) => "upload_failed",
            Self::UploadTimedOut(_) => "upload_timeout",
            Self::Internal(_) => "internal_error",
            Self::Store(_) => "store_error",
            Self::Core(_) => "bad_request",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upload(_) => StatusCode::BAD_GATEWAY,
            Self::UploadTimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
