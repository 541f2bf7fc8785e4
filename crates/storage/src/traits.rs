//! Remote storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A finished upload: where the bytes landed and how to reach them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredObject {
    /// Stable identifier of the object within the backend.
    pub remote_id: String,
    /// Link granting read access to anyone holding it.
    pub public_link: String,
}

/// External object store exposing create-object and set-permission
/// operations.
///
/// Backends do not retry; transport and service errors propagate to the
/// caller, which owns any retry decision.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Write a named payload into a destination folder, returning the
    /// object's stable identifier. Every call creates a distinct object;
    /// uploading the same name twice never overwrites.
    async fn create_object(
        &self,
        folder: &str,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<String>;

    /// Grant read access to anyone holding the object's link, and return
    /// that link.
    async fn grant_public_read(&self, remote_id: &str) -> StorageResult<String>;

    /// Static identifier for the backend type, for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify backend connectivity. Called at startup so the server never
    /// reports healthy with unreachable storage.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Push a payload to the remote store and make it link-shareable.
///
/// Both calls must succeed. A grant failure after a successful write yields
/// [`StorageError::ShareFailed`] carrying the orphaned remote id; the content
/// is not deleted.
pub async fn publish(
    store: &dyn RemoteStore,
    folder: &str,
    name: &str,
    content_type: &str,
    data: Bytes,
) -> StorageResult<StoredObject> {
    let remote_id = store.create_object(folder, name, content_type, data).await?;
    match store.grant_public_read(&remote_id).await {
        Ok(public_link) => Ok(StoredObject {
            remote_id,
            public_link,
        }),
        Err(source) => Err(StorageError::ShareFailed {
            remote_id,
            source: Box::new(source),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store whose permission grant always fails.
    #[derive(Default)]
    struct GrantlessStore {
        creates: AtomicU32,
    }

    #[async_trait]
    impl RemoteStore for GrantlessStore {
        async fn create_object(
            &self,
            folder: &str,
            name: &str,
            _content_type: &str,
            _data: Bytes,
        ) -> StorageResult<String> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{folder}/{name}"))
        }

        async fn grant_public_read(&self, remote_id: &str) -> StorageResult<String> {
            Err(StorageError::NotFound(remote_id.to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "grantless"
        }
    }

    #[tokio::test]
    async fn publish_reports_partial_failure_with_remote_id() {
        let store = GrantlessStore::default();
        let err = publish(&store, "packs", "kit.zip", "application/zip", Bytes::new())
            .await
            .unwrap_err();

        match err {
            StorageError::ShareFailed { remote_id, .. } => {
                assert_eq!(remote_id, "packs/kit.zip");
            }
            other => panic!("unexpected: {other:?}"),
        }
        // The content write is not compensated.
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }
}
