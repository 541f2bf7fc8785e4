//! In-memory session store.

use crate::error::{StoreError, StoreResult};
use crate::traits::{IncomingPart, PartOutcome, SessionStore, SessionSummary};
use async_trait::async_trait;
use stash_core::{SessionId, SessionState, UploadSession};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;

/// Process-wide session map for single-instance deployments.
///
/// Each session sits behind its own mutex, so concurrent chunks for the same
/// upload serialize against each other while unrelated uploads proceed in
/// parallel. Lock order is always map-then-session; no task ever takes the
/// map lock while holding a session lock.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<UploadSession>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, id: SessionId) -> Option<Arc<Mutex<UploadSession>>> {
        self.sessions.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, session: UploadSession) -> StoreResult<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.id) {
            return Err(StoreError::AlreadyExists(session.id.to_string()));
        }
        sessions.insert(session.id, Arc::new(Mutex::new(session)));
        Ok(())
    }

    async fn get(&self, id: SessionId) -> StoreResult<Option<SessionSummary>> {
        let Some(entry) = self.entry(id).await else {
            return Ok(None);
        };
        let session = entry.lock().await;
        Ok(Some(SessionSummary {
            received: session.received_count(),
            total: session.expected_total,
            last_touched: session.last_touched,
        }))
    }

    async fn store_part(&self, id: SessionId, part: IncomingPart) -> StoreResult<PartOutcome> {
        let entry = self
            .entry(id)
            .await
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut session = entry.lock().await;
        if !session.state.is_receiving() {
            // Claimed by a racing final chunk; the session is as good as gone.
            return Err(StoreError::NotFound(id.to_string()));
        }

        session.store_part(part.index, part.total, part.payload);
        session.last_touched = part.received_at;

        if session.is_complete() {
            // Claim under the session lock so only one caller ever sees
            // the complete session.
            session.state = SessionState::Finalizing;
            return Ok(PartOutcome::Complete(session.clone()));
        }

        Ok(PartOutcome::Accepted {
            received: session.received_count(),
            total: session.expected_total,
        })
    }

    async fn delete(&self, id: SessionId) -> StoreResult<()> {
        self.sessions.lock().await.remove(&id);
        Ok(())
    }

    async fn reap_expired(&self, cutoff: OffsetDateTime) -> StoreResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let mut expired = Vec::new();
        for (id, entry) in sessions.iter() {
            let session = entry.lock().await;
            if session.is_expired(cutoff) {
                expired.push(*id);
            }
        }
        for id in &expired {
            sessions.remove(id);
        }
        Ok(expired.len() as u64)
    }

    async fn live_count(&self) -> StoreResult<u64> {
        Ok(self.sessions.lock().await.len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
