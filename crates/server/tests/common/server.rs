//! Server test utilities.

use stash_core::config::{AppConfig, StorageConfig};
use stash_server::{AppState, create_router};
use stash_storage::{FilesystemBackend, RemoteStore};
use stash_store::{MemoryStore, SessionStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub storage_root: PathBuf,
    _temp_dirs: Vec<TempDir>,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server with an in-memory session store and temporary
    /// filesystem storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let sessions: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        Self::build(sessions, modifier).await
    }

    /// Create a test server backed by a SQLite session store.
    pub async fn with_sqlite_store() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("sessions.db");
        let sessions: Arc<dyn SessionStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create sqlite session store"),
        );
        // Keep the temp dir holding the database alive alongside the one
        // build() creates for storage.
        let mut server = Self::build(sessions, |_| {}).await;
        server._temp_dirs.push(temp_dir);
        server
    }

    async fn build<F>(sessions: Arc<dyn SessionStore>, modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        std::fs::create_dir_all(&storage_path).expect("Failed to create storage directory");
        let storage: Arc<dyn RemoteStore> = Arc::new(
            FilesystemBackend::new(&storage_path, None)
                .await
                .expect("Failed to create storage backend"),
        );

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: storage_path.clone(),
            public_base_url: None,
        };
        modifier(&mut config);

        let state = AppState::new(config, sessions, storage);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            storage_root: storage_path,
            _temp_dirs: vec![temp_dir],
        }
    }

    /// Collect every object in filesystem storage as (key, bytes) pairs.
    pub fn stored_objects(&self) -> Vec<(String, Vec<u8>)> {
        let mut objects = Vec::new();
        collect_files(&self.storage_root, &self.storage_root, &mut objects);
        objects.sort();
        objects
    }
}

fn collect_files(root: &PathBuf, dir: &PathBuf, out: &mut Vec<(String, Vec<u8>)>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else {
            let key = path
                .strip_prefix(root)
                .expect("entry under root")
                .to_string_lossy()
                .replace('\\', "/");
            let bytes = std::fs::read(&path).expect("read stored object");
            out.push((key, bytes));
        }
    }
}
