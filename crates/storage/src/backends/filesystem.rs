//! Local filesystem storage backend.
//!
//! Intended for development and tests: objects land under a root directory
//! and "public" links are either file:// URLs or keys appended to a
//! configured base URL. The permission grant is a no-op because local files
//! are link-addressable by path.

use crate::error::{StorageError, StorageResult};
use crate::traits::RemoteStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at `root`.
    pub async fn new(
        root: impl AsRef<Path>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_base_url: public_base_url.map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    /// Validate one client-supplied path segment.
    ///
    /// Folder and file names come straight from requests, so anything that
    /// could step outside the storage root is rejected rather than
    /// sanitized.
    fn validate_segment(segment: &str) -> StorageResult<()> {
        if segment.is_empty() {
            return Err(StorageError::InvalidKey("empty path segment".to_string()));
        }
        if segment == "." || segment == ".." {
            return Err(StorageError::InvalidKey(format!(
                "path traversal not allowed: {segment}"
            )));
        }
        if segment.contains('/') || segment.contains('\\') || segment.contains('\0') {
            return Err(StorageError::InvalidKey(format!(
                "contains unsafe path component: {segment}"
            )));
        }
        Ok(())
    }

    /// Resolve a key to its path under the root.
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        for segment in key.split('/') {
            Self::validate_segment(segment)?;
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl RemoteStore for FilesystemBackend {
    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn create_object(
        &self,
        folder: &str,
        name: &str,
        _content_type: &str,
        data: Bytes,
    ) -> StorageResult<String> {
        Self::validate_segment(folder)?;
        Self::validate_segment(name)?;

        // Prefix a v7 UUID so repeated uploads of the same name create
        // distinct objects, matching the id-per-upload behavior of hosted
        // object stores.
        let key = format!("{}/{}-{}", folder, Uuid::now_v7().simple(), name);
        let path = self.key_path(&key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a temp file, fsync, then rename for atomicity.
        let temp_path = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &path).await?;

        Ok(key)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn grant_public_read(&self, remote_id: &str) -> StorageResult<String> {
        let path = self.key_path(remote_id)?;
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(remote_id.to_string()));
        }

        Ok(match &self.public_base_url {
            Some(base) => format!("{base}/{remote_id}"),
            None => format!("file://{}", path.display()),
        })
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        if !fs::try_exists(&self.root).await? {
            return Err(StorageError::Config(format!(
                "storage root does not exist: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}
