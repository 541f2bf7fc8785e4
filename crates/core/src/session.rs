//! Upload session types and lifecycle.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for an upload session.
///
/// Backed by a UUIDv7 so the token carries a monotonic timestamp component
/// alongside random bits, and ids never collide among live sessions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new session ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidSessionId(format!("{s}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upload session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Session is accepting parts.
    Receiving,
    /// Session is complete and has been claimed for the remote upload.
    /// No further parts are accepted; the claimer deletes the session.
    Finalizing,
}

impl SessionState {
    /// Check if the session can still receive parts.
    pub fn is_receiving(&self) -> bool {
        matches!(self, Self::Receiving)
    }

    /// Wire representation used by persisted stores.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receiving => "receiving",
            Self::Finalizing => "finalizing",
        }
    }
}

/// An in-progress chunked upload.
///
/// `parts` is indexed by chunk position; an empty buffer marks an unfilled
/// slot. The vector only ever grows: if a later chunk declares a larger
/// total than previously seen, the session adapts (the total may be learned
/// from the first chunk rather than at creation).
#[derive(Clone, Debug)]
pub struct UploadSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Destination file name, fixed at creation.
    pub file_name: String,
    /// MIME type hint, fixed at creation.
    pub file_type: String,
    /// Remote storage folder this upload lands in.
    pub folder: String,
    /// Received parts, indexed by chunk position.
    pub parts: Vec<Bytes>,
    /// Highest total-chunk count declared so far. Zero until the first chunk.
    pub expected_total: u32,
    /// Current session state.
    pub state: SessionState,
    /// When the session was created.
    pub created_at: OffsetDateTime,
    /// Refreshed on every part received; drives the reaper.
    pub last_touched: OffsetDateTime,
}

impl UploadSession {
    /// Create a new session with no parts.
    pub fn new(file_name: String, file_type: String, folder: String) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: SessionId::new(),
            file_name,
            file_type,
            folder,
            parts: Vec::new(),
            expected_total: 0,
            state: SessionState::Receiving,
            created_at: now,
            last_touched: now,
        }
    }

    /// Integrate one part, growing the part table if `total` exceeds the
    /// highest count seen so far. Re-sending an index overwrites (last
    /// write wins). Does not touch `last_touched`; the store owns that.
    pub fn store_part(&mut self, index: u32, total: u32, payload: Bytes) {
        debug_assert!(index < total, "caller validates index < total");
        if total > self.expected_total {
            self.expected_total = total;
        }
        if self.parts.len() < self.expected_total as usize {
            self.parts.resize(self.expected_total as usize, Bytes::new());
        }
        self.parts[index as usize] = payload;
    }

    /// Number of filled slots in `[0, expected_total)`.
    pub fn received_count(&self) -> u32 {
        self.parts
            .iter()
            .take(self.expected_total as usize)
            .filter(|p| !p.is_empty())
            .count() as u32
    }

    /// A session is complete iff every slot in `[0, expected_total)` holds
    /// a non-empty buffer. A session that has never seen a chunk is not
    /// complete.
    pub fn is_complete(&self) -> bool {
        self.expected_total > 0 && self.received_count() == self.expected_total
    }

    /// Check if the session has been idle past the given cutoff.
    pub fn is_expired(&self, cutoff: OffsetDateTime) -> bool {
        self.last_touched < cutoff
    }

    /// Concatenate all parts in index order into one contiguous payload.
    ///
    /// Fails on an incomplete session. The completion check in the chunk
    /// path makes that unreachable for request-triggered reassembly; hitting
    /// it indicates a defect, not a caller error.
    pub fn assemble(&self) -> crate::Result<Bytes> {
        if !self.is_complete() {
            let missing = self.expected_total as usize - self.received_count() as usize;
            return Err(crate::Error::IncompleteSession {
                missing,
                total: self.expected_total,
            });
        }

        let len: usize = self.parts[..self.expected_total as usize]
            .iter()
            .map(|p| p.len())
            .sum();
        let mut buf = BytesMut::with_capacity(len);
        for part in &self.parts[..self.expected_total as usize] {
            buf.extend_from_slice(part);
        }
        Ok(buf.freeze())
    }
}

/// Request to initiate an upload session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateUploadRequest {
    /// Destination file name.
    pub file_name: String,
    /// MIME type of the finished file.
    pub file_type: String,
    /// Remote folder; falls back to the configured default when absent.
    #[serde(default)]
    pub folder: Option<String>,
}

/// Response from initiating an upload session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateUploadResponse {
    /// The upload session ID.
    pub upload_id: String,
}

/// Acknowledgement for a non-final chunk.
#[derive(Clone, Debug, Serialize)]
pub struct ChunkAck {
    /// Always "chunk-received".
    pub status: &'static str,
    /// Filled slots so far.
    pub received: u32,
    /// Total chunks expected.
    pub total: u32,
}

/// Response from querying upload state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadStatusResponse {
    /// Filled slots so far.
    pub received: u32,
    /// Total chunks expected (zero until the first chunk declares it).
    pub total: u32,
    /// When the session becomes eligible for reaping, RFC 3339.
    pub expires_at: String,
}
