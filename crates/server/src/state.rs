//! Application state shared across handlers.

use stash_core::config::AppConfig;
use stash_storage::RemoteStore;
use stash_store::SessionStore;
use std::sync::Arc;

/// Shared application state.
///
/// The session store is the only shared mutable resource in the upload
/// subsystem; every request handler resolves the same instance through this
/// state, never a per-request copy.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Upload session store.
    pub sessions: Arc<dyn SessionStore>,
    /// Remote object storage backend.
    pub storage: Arc<dyn RemoteStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Validates configuration, logging warnings for workable-but-odd
    /// settings.
    ///
    /// # Panics
    ///
    /// Panics if server limits are invalid; the process cannot meaningfully
    /// run with, say, a zero chunk-size ceiling.
    pub fn new(
        config: AppConfig,
        sessions: Arc<dyn SessionStore>,
        storage: Arc<dyn RemoteStore>,
    ) -> Self {
        match config.server.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    tracing::warn!("Configuration warning: {}", warning);
                }
            }
            Err(error) => {
                panic!("Invalid server configuration: {}", error);
            }
        }

        Self {
            config: Arc::new(config),
            sessions,
            storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_storage::FilesystemBackend;
    use stash_store::MemoryStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn new_accepts_default_config() {
        let temp = tempdir().unwrap();
        let storage: Arc<dyn RemoteStore> =
            Arc::new(FilesystemBackend::new(temp.path(), None).await.unwrap());
        let sessions: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());

        let state = AppState::new(AppConfig::for_testing(), sessions, storage);
        assert_eq!(state.sessions.backend_name(), "memory");
        assert_eq!(state.storage.backend_name(), "filesystem");
    }

    #[tokio::test]
    #[should_panic(expected = "Invalid server configuration")]
    async fn new_panics_on_invalid_limits() {
        let temp = tempdir().unwrap();
        let storage: Arc<dyn RemoteStore> =
            Arc::new(FilesystemBackend::new(temp.path(), None).await.unwrap());
        let sessions: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());

        let mut config = AppConfig::for_testing();
        config.server.max_chunk_size = 0;
        AppState::new(config, sessions, storage);
    }
}
