//! Upload control plane handlers.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    ACTIVE_SESSIONS, BYTES_RECEIVED, CHUNK_RECEIVE_DURATION, CHUNKS_RECEIVED, REMOTE_UPLOAD_DURATION,
    SESSIONS_COMPLETED, SESSIONS_CREATED, record_upload_error,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use stash_core::session::{ChunkAck, CreateUploadRequest, CreateUploadResponse, UploadStatusResponse};
use stash_core::{SessionId, UploadSession};
use stash_storage::{StoredObject, publish};
use stash_store::{IncomingPart, PartOutcome, SessionStore};
use std::time::Instant;
use time::OffsetDateTime;

/// Maximum request body size for create upload requests (64 KiB).
/// The body is a small JSON document; anything larger is malformed.
const MAX_CREATE_BODY_SIZE: usize = 64 * 1024;

/// Additional buffer for chunk bodies beyond the configured ceiling, so the
/// read completes and the oversize check can produce a precise error.
const CHUNK_UPLOAD_BUFFER: usize = 1024;

/// Reject client-supplied names that could not name a remote object.
///
/// The storage backends enforce this again at write time; checking here
/// turns a doomed session into a Bad-Request at creation instead of a
/// confusing remote failure at the final chunk.
pub(crate) fn validate_object_name(field: &str, value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    if value == "." || value == ".." {
        return Err(ApiError::BadRequest(format!(
            "{field} must not be a relative path component"
        )));
    }
    if value.contains('/') || value.contains('\\') || value.contains('\0') {
        return Err(ApiError::BadRequest(format!(
            "{field} must not contain path separators"
        )));
    }
    Ok(())
}

/// Push a finished payload to remote storage, bounded by the configured
/// timeout so a stalled network call cannot pin a worker.
pub(crate) async fn publish_with_timeout(
    state: &AppState,
    folder: &str,
    name: &str,
    content_type: &str,
    payload: Bytes,
) -> ApiResult<StoredObject> {
    let start = Instant::now();
    let result = tokio::time::timeout(
        state.config.server.remote_timeout(),
        publish(state.storage.as_ref(), folder, name, content_type, payload),
    )
    .await;
    REMOTE_UPLOAD_DURATION.observe(start.elapsed().as_secs_f64());

    match result {
        Ok(Ok(object)) => Ok(object),
        Ok(Err(e)) => {
            record_upload_error("remote_storage");
            Err(e.into())
        }
        Err(_elapsed) => {
            record_upload_error("remote_timeout");
            Err(ApiError::UploadTimedOut(
                state.config.server.remote_timeout_secs,
            ))
        }
    }
}

/// POST /v1/uploads - Initiate an upload session.
#[tracing::instrument(skip(state, req))]
pub async fn create_upload(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<CreateUploadResponse>)> {
    let body: CreateUploadRequest = {
        let bytes = axum::body::to_bytes(req.into_body(), MAX_CREATE_BODY_SIZE)
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))?
    };

    validate_object_name("file_name", &body.file_name)?;
    if body.file_type.is_empty() {
        return Err(ApiError::BadRequest("file_type must not be empty".to_string()));
    }
    let folder = match body.folder {
        Some(folder) => {
            validate_object_name("folder", &folder)?;
            folder
        }
        None => state.config.server.default_folder.clone(),
    };

    let session = UploadSession::new(body.file_name, body.file_type, folder);
    let upload_id = session.id;
    state.sessions.create(session).await?;

    SESSIONS_CREATED.inc();
    ACTIVE_SESSIONS.inc();
    tracing::info!(upload_id = %upload_id, "Created upload session");

    Ok((
        StatusCode::CREATED,
        Json(CreateUploadResponse {
            upload_id: upload_id.to_string(),
        }),
    ))
}

/// Query parameters for chunk submission.
#[derive(Debug, Deserialize)]
pub struct ChunkParams {
    /// Total number of chunks the client declares for this upload.
    pub total: u32,
}

/// PUT /v1/uploads/{upload_id}/chunks/{chunk_index}?total={n} - Submit one chunk.
///
/// Answers an acknowledgement with progress, or - when this chunk fills the
/// last open slot - the final `{remote_id, public_link}` after relaying the
/// reassembled payload to remote storage.
#[tracing::instrument(skip(state, req), fields(upload_id = %upload_id, chunk_index))]
pub async fn upload_chunk(
    State(state): State<AppState>,
    Path((upload_id, chunk_index)): Path<(String, u32)>,
    Query(params): Query<ChunkParams>,
    req: Request,
) -> ApiResult<Response> {
    let start = Instant::now();
    let id = SessionId::parse(&upload_id)?;
    let total = params.total;

    if total == 0 {
        record_upload_error("zero_total_chunks");
        return Err(ApiError::BadRequest("total must be at least 1".to_string()));
    }
    if chunk_index >= total {
        record_upload_error("chunk_index_out_of_range");
        return Err(ApiError::BadRequest(format!(
            "chunk index {chunk_index} out of range for {total} chunks"
        )));
    }
    if total > state.config.server.max_total_chunks {
        record_upload_error("too_many_chunks");
        return Err(ApiError::BadRequest(format!(
            "total {} exceeds maximum chunk count {}",
            total, state.config.server.max_total_chunks
        )));
    }

    let payload = axum::body::to_bytes(
        req.into_body(),
        state.config.server.max_chunk_size as usize + CHUNK_UPLOAD_BUFFER,
    )
    .await
    .map_err(|e| ApiError::BadRequest(format!("failed to read chunk: {e}")))?;

    if payload.is_empty() {
        record_upload_error("empty_chunk");
        return Err(ApiError::BadRequest("chunk payload must not be empty".to_string()));
    }
    if payload.len() as u64 > state.config.server.max_chunk_size {
        record_upload_error("chunk_too_large");
        return Err(ApiError::BadRequest(format!(
            "chunk size {} exceeds maximum {}",
            payload.len(),
            state.config.server.max_chunk_size
        )));
    }

    let size = payload.len() as u64;
    let outcome = state
        .sessions
        .store_part(
            id,
            IncomingPart {
                index: chunk_index,
                total,
                payload,
                received_at: OffsetDateTime::now_utc(),
            },
        )
        .await?;

    CHUNKS_RECEIVED.inc();
    BYTES_RECEIVED.inc_by(size);
    CHUNK_RECEIVE_DURATION.observe(start.elapsed().as_secs_f64());

    match outcome {
        PartOutcome::Accepted { received, total } => {
            tracing::debug!(
                upload_id = %id,
                chunk_index,
                received,
                total,
                "Chunk received"
            );
            Ok(Json(ChunkAck {
                status: "chunk-received",
                received,
                total,
            })
            .into_response())
        }
        PartOutcome::Complete(session) => {
            let object = finalize_session(&state, session).await?;
            Ok(Json(object).into_response())
        }
    }
}

/// Relay a complete session to remote storage.
///
/// The session is deleted from the store before the remote call: the claim
/// made it invisible to other chunk submissions already, and removing it
/// first guarantees no store entry is held across network I/O.
async fn finalize_session(state: &AppState, session: UploadSession) -> ApiResult<StoredObject> {
    state.sessions.delete(session.id).await?;
    ACTIVE_SESSIONS.dec();

    let payload = session.assemble().map_err(|e| {
        record_upload_error("reassembly_invariant");
        ApiError::Internal(format!("reassembly of a claimed session failed: {e}"))
    })?;

    let object = publish_with_timeout(
        state,
        &session.folder,
        &session.file_name,
        &session.file_type,
        payload,
    )
    .await?;

    SESSIONS_COMPLETED.inc();
    tracing::info!(
        upload_id = %session.id,
        remote_id = %object.remote_id,
        "Upload relayed to remote storage"
    );
    Ok(object)
}

/// GET /v1/uploads/{upload_id} - Query upload progress.
#[tracing::instrument(skip(state), fields(upload_id = %upload_id))]
pub async fn get_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<UploadStatusResponse>> {
    let id = SessionId::parse(&upload_id)?;

    let summary = state
        .sessions
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("upload session not found: {id}")))?;

    let expires_at = (summary.last_touched + state.config.server.session_max_age())
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|e| ApiError::Internal(format!("failed to format expires_at: {e}")))?;

    Ok(Json(UploadStatusResponse {
        received: summary.received,
        total: summary.total,
        expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_object_name_rejects_traversal() {
        assert!(validate_object_name("file_name", "kit.zip").is_ok());
        assert!(validate_object_name("file_name", "").is_err());
        assert!(validate_object_name("file_name", "..").is_err());
        assert!(validate_object_name("file_name", "a/b").is_err());
        assert!(validate_object_name("file_name", "a\\b").is_err());
        assert!(validate_object_name("file_name", "a\0b").is_err());
    }
}
