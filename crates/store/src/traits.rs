//! Session store trait definitions.

use crate::error::StoreResult;
use async_trait::async_trait;
use bytes::Bytes;
use stash_core::{SessionId, UploadSession};
use time::OffsetDateTime;

/// One validated chunk, ready to be integrated into a session.
///
/// The caller has already checked `index < total`, the configured ceilings,
/// and that the payload is non-empty; the store only integrates.
#[derive(Clone, Debug)]
pub struct IncomingPart {
    /// Chunk position.
    pub index: u32,
    /// Total chunks the client declared on this request.
    pub total: u32,
    /// Chunk bytes.
    pub payload: Bytes,
    /// Request arrival time; becomes the session's `last_touched`.
    pub received_at: OffsetDateTime,
}

/// Result of integrating one part.
#[derive(Debug)]
pub enum PartOutcome {
    /// The part was stored; the session is still missing slots.
    Accepted {
        /// Filled slots so far.
        received: u32,
        /// Highest declared total.
        total: u32,
    },
    /// This part filled the last slot and this caller won the claim: the
    /// store handed over the complete session exactly once. The caller must
    /// delete the session before any remote I/O.
    Complete(UploadSession),
}

/// A live session's progress, for the status endpoint and the reaper.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    /// Filled slots so far.
    pub received: u32,
    /// Highest declared total (zero until the first chunk).
    pub total: u32,
    /// Last activity on the session.
    pub last_touched: OffsetDateTime,
}

/// Session store abstraction.
///
/// Every mutation of a single session is atomic inside the store: two chunks
/// for the same upload arriving concurrently never lose a write, and the
/// `Complete` outcome is produced for exactly one caller. Mutations of
/// unrelated sessions proceed independently.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Insert a fresh session. Fails if the id is already live.
    async fn create(&self, session: UploadSession) -> StoreResult<()>;

    /// Look up a live session's progress. `None` for unknown ids.
    async fn get(&self, id: SessionId) -> StoreResult<Option<SessionSummary>>;

    /// Integrate one part: grow the part table if a larger total is
    /// declared, store the payload at its index (last write wins), and
    /// refresh `last_touched`. Fails `NotFound` for unknown ids and for
    /// sessions already claimed for finalization.
    async fn store_part(&self, id: SessionId, part: IncomingPart) -> StoreResult<PartOutcome>;

    /// Remove a session. Idempotent: deleting an absent id is a no-op.
    async fn delete(&self, id: SessionId) -> StoreResult<()>;

    /// Delete every session with `last_touched` older than the cutoff,
    /// discarding partial chunks silently. Returns the number removed.
    async fn reap_expired(&self, cutoff: OffsetDateTime) -> StoreResult<u64>;

    /// Number of live sessions.
    async fn live_count(&self) -> StoreResult<u64>;

    /// Static identifier for the backend type, for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify the backing store is usable.
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
