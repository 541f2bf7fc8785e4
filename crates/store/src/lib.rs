//! Session store abstraction and backends for the Stash upload relay.
//!
//! This crate owns the control-plane state of in-progress chunked uploads:
//! - The `SessionStore` trait with atomic per-session mutation
//! - An in-memory map for single-instance deployments
//! - A SQLite-backed table for deployments that must survive restarts

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{IncomingPart, PartOutcome, SessionStore, SessionSummary};

use stash_core::config::StoreConfig;
use std::sync::Arc;

/// Create a session store from configuration.
pub async fn from_config(config: &StoreConfig) -> StoreResult<Arc<dyn SessionStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store))
        }
    }
}
