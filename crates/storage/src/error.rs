//! Storage error types.

use thiserror::Error;

/// Remote storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// The content write succeeded but the permission grant did not: the
    /// object exists under `remote_id` without public access. Reported, not
    /// compensated; the caller decides whether to retry the grant or treat
    /// the object as orphaned.
    #[error("object stored as {remote_id} but could not be made public: {source}")]
    ShareFailed {
        remote_id: String,
        #[source]
        source: Box<StorageError>,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
