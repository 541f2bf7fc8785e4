//! Background eviction of idle upload sessions.
//!
//! An abandoned chunked upload never completes on its own: the client is
//! generally long gone, so eviction is silent and discards any partial
//! chunks. Subsequent submissions against a reaped id fail Not-Found.

use crate::metrics::{ACTIVE_SESSIONS, SESSIONS_REAPED};
use crate::state::AppState;
use stash_store::{SessionStore, StoreError};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn the periodic reaper task.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    let interval = state.config.server.reap_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = reap_once(&state).await {
                tracing::warn!(error = %e, "Session reap failed");
            }
        }
    })
}

/// Run one reap pass: delete every session idle past the configured maximum
/// age. Returns the number evicted.
pub async fn reap_once(state: &AppState) -> Result<u64, StoreError> {
    let cutoff = OffsetDateTime::now_utc() - state.config.server.session_max_age();
    let reaped = state.sessions.reap_expired(cutoff).await?;
    if reaped > 0 {
        SESSIONS_REAPED.inc_by(reaped);
        ACTIVE_SESSIONS.sub(reaped as i64);
        tracing::info!(reaped, "Evicted idle upload sessions");
    }
    Ok(reaped)
}
