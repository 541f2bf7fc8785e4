//! Core error types.

use thiserror::Error;

/// Errors produced by core domain logic.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid upload ID: {0}")]
    InvalidSessionId(String),

    #[error("incomplete session: {missing} of {total} parts missing")]
    IncompleteSession { missing: usize, total: u32 },

    #[error("invalid file name: {0}")]
    InvalidFileName(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
