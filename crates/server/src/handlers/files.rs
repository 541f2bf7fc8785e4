//! Direct (non-chunked) upload handler for small files.

use crate::error::{ApiError, ApiResult};
use crate::handlers::uploads::{publish_with_timeout, validate_object_name};
use crate::metrics::{DIRECT_UPLOADS, record_upload_error};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, Request, State};
use axum::http::header;
use serde::Deserialize;
use stash_storage::StoredObject;

/// Fallback MIME type when neither header nor query name one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Additional buffer beyond the configured ceiling so the oversize check
/// can produce a precise error instead of a truncated read.
const DIRECT_UPLOAD_BUFFER: usize = 1024;

/// Query parameters for the direct upload path.
#[derive(Debug, Deserialize)]
pub struct DirectUploadParams {
    /// Destination file name.
    pub file_name: String,
    /// Remote folder; falls back to the configured default when absent.
    #[serde(default)]
    pub folder: Option<String>,
    /// MIME type override; the Content-Type header wins when both are set.
    #[serde(default)]
    pub file_type: Option<String>,
}

/// POST /v1/files?file_name=..&folder=.. - Upload a small file in one request.
///
/// Bypasses the session subsystem entirely: the request body goes straight
/// to the remote storage uploader.
#[tracing::instrument(skip(state, req), fields(file_name = %params.file_name))]
pub async fn direct_upload(
    State(state): State<AppState>,
    Query(params): Query<DirectUploadParams>,
    req: Request,
) -> ApiResult<Json<StoredObject>> {
    validate_object_name("file_name", &params.file_name)?;
    let folder = match params.folder {
        Some(folder) => {
            validate_object_name("folder", &folder)?;
            folder
        }
        None => state.config.server.default_folder.clone(),
    };

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(params.file_type)
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let payload = axum::body::to_bytes(
        req.into_body(),
        state.config.server.max_direct_size as usize + DIRECT_UPLOAD_BUFFER,
    )
    .await
    .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;

    if payload.is_empty() {
        record_upload_error("empty_direct_upload");
        return Err(ApiError::BadRequest("file payload must not be empty".to_string()));
    }
    if payload.len() as u64 > state.config.server.max_direct_size {
        record_upload_error("direct_upload_too_large");
        return Err(ApiError::BadRequest(format!(
            "file size {} exceeds direct upload maximum {}; use the chunked path",
            payload.len(),
            state.config.server.max_direct_size
        )));
    }

    let object =
        publish_with_timeout(&state, &folder, &params.file_name, &content_type, payload).await?;

    DIRECT_UPLOADS.inc();
    tracing::info!(remote_id = %object.remote_id, "Direct upload relayed to remote storage");
    Ok(Json(object))
}
