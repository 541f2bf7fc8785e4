//! Core domain types and shared logic for the Stash upload relay.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Upload session identifiers and lifecycle
//! - Part bookkeeping and reassembly
//! - Request/response types for the upload control plane
//! - Configuration shared by the server, store, and storage crates

pub mod config;
pub mod error;
pub mod session;

pub use error::{Error, Result};
pub use session::{SessionId, SessionState, UploadSession};

/// Default maximum chunk size: 16 MiB
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

/// Default maximum number of chunks a session may declare.
pub const DEFAULT_MAX_TOTAL_CHUNKS: u32 = 10_000;

/// Default maximum payload size for the direct (non-chunked) path: 32 MiB
pub const DEFAULT_MAX_DIRECT_SIZE: u64 = 32 * 1024 * 1024;
