//! Administrative endpoints.

use crate::error::ApiResult;
use crate::reaper;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Response from an on-demand reap.
#[derive(Debug, Serialize)]
pub struct ReapResponse {
    /// Number of idle sessions evicted.
    pub reaped: u64,
}

/// POST /v1/admin/reap - Evict idle sessions now.
///
/// The background reaper runs on its own interval; this exists for
/// operational hygiene and tests.
#[tracing::instrument(skip(state))]
pub async fn reap_now(State(state): State<AppState>) -> ApiResult<Json<ReapResponse>> {
    let reaped = reaper::reap_once(&state).await?;
    Ok(Json(ReapResponse { reaped }))
}
