//! Health and capability discovery endpoints.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;
use serde_json::{Value, json};
use stash_store::SessionStore;

/// GET /v1/health
///
/// Intentionally unauthenticated for load balancers and k8s probes.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.sessions.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Capabilities response.
#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    /// Maximum chunk size in bytes.
    pub max_chunk_size: u64,
    /// Maximum number of chunks per upload.
    pub max_total_chunks: u32,
    /// Maximum payload size for the direct path in bytes.
    pub max_direct_size: u64,
    /// API version.
    pub api_version: &'static str,
}

/// GET /v1/capabilities
pub async fn get_capabilities(
    State(state): State<AppState>,
) -> ApiResult<Json<CapabilitiesResponse>> {
    Ok(Json(CapabilitiesResponse {
        max_chunk_size: state.config.server.max_chunk_size,
        max_total_chunks: state.config.server.max_total_chunks,
        max_direct_size: state.config.server.max_direct_size,
        api_version: "v1",
    }))
}
