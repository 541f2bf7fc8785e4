//! S3-compatible storage backend using AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::RemoteStore;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use bytes::Bytes;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::instrument;
use uuid::Uuid;

fn map_s3_operation_error<E>(err: aws_sdk_s3::error::SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::S3(Box::new(err))
}

/// S3-compatible object store using AWS SDK.
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Normalized endpoint, if an explicit one was configured.
    endpoint: Option<String>,
    region: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// # Arguments
    /// * `force_path_style` - Use path-style URLs (`endpoint/bucket/key`)
    ///   instead of virtual-hosted style (`bucket.endpoint/key`). Required
    ///   for MinIO and some S3-compatible services.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        let has_access_key_id = access_key_id.is_some();
        let has_secret_access_key = secret_access_key.is_some();
        if has_access_key_id ^ has_secret_access_key {
            return Err(StorageError::Config(
                "s3 config requires both access_key_id and secret_access_key when either is set"
                    .to_string(),
            ));
        }

        let resolved_region = region.unwrap_or_else(|| "us-east-1".to_string());
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(resolved_region.clone()))
            .load()
            .await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&shared);

        // Explicit credentials override the ambient chain.
        if let (Some(key_id), Some(secret)) = (access_key_id, secret_access_key) {
            let credentials =
                aws_sdk_s3::config::Credentials::new(key_id, secret, None, None, "stash-config");
            s3_config_builder = s3_config_builder.credentials_provider(credentials);
        }

        // Handle bare host:port endpoints (e.g., "minio:9000") by prepending http://
        let normalized_endpoint = endpoint.as_ref().map(|endpoint_url| {
            let endpoint_lower = endpoint_url.to_lowercase();
            if endpoint_lower.starts_with("http://") || endpoint_lower.starts_with("https://") {
                endpoint_url.trim_end_matches('/').to_string()
            } else {
                format!("http://{}", endpoint_url.trim_end_matches('/'))
            }
        });

        if let Some(endpoint_url) = &normalized_endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        // Normalize prefix: strip trailing slashes to avoid double-slash keys
        let normalized_prefix = prefix.map(|p| p.trim_end_matches('/').to_string());

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            prefix: normalized_prefix,
            endpoint: normalized_endpoint,
            region: resolved_region,
        })
    }

    /// Get the full object key (applies prefix if configured).
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Percent-encode a key for use in a URL, preserving `/` separators.
    fn encode_key(key: &str) -> String {
        key.split('/')
            .map(|segment| utf8_percent_encode(segment, NON_ALPHANUMERIC).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Build the public URL for an object key.
    fn public_url(&self, key: &str) -> String {
        let encoded = Self::encode_key(key);
        match &self.endpoint {
            // Explicit endpoints (MinIO etc.) serve path-style URLs.
            Some(endpoint) => format!("{}/{}/{}", endpoint, self.bucket, encoded),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, encoded
            ),
        }
    }
}

#[async_trait]
impl RemoteStore for S3Backend {
    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn create_object(
        &self,
        folder: &str,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<String> {
        if folder.is_empty() || name.is_empty() {
            return Err(StorageError::InvalidKey(
                "folder and name must be non-empty".to_string(),
            ));
        }

        // Prefix a v7 UUID so repeated uploads of the same name create
        // distinct objects.
        let key = self.full_key(&format!("{}/{}-{}", folder, Uuid::now_v7().simple(), name));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(map_s3_operation_error)?;

        Ok(key)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn grant_public_read(&self, remote_id: &str) -> StorageResult<String> {
        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(remote_id)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(map_s3_operation_error)?;

        Ok(self.public_url(remote_id))
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(map_s3_operation_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend(endpoint: Option<&str>) -> S3Backend {
        S3Backend::new(
            "packs",
            endpoint.map(String::from),
            Some("eu-west-1".to_string()),
            None,
            Some("access".to_string()),
            Some("secret".to_string()),
            endpoint.is_some(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn rejects_partial_credentials() {
        let result = S3Backend::new(
            "packs",
            None,
            None,
            None,
            Some("access".to_string()),
            None,
            false,
        )
        .await;
        assert!(matches!(result, Err(StorageError::Config(_))));
    }

    #[tokio::test]
    async fn public_url_virtual_hosted_by_default() {
        let backend = backend(None).await;
        assert_eq!(
            backend.public_url("samples/kit.zip"),
            "https://packs.s3.eu-west-1.amazonaws.com/samples/kit%2Ezip"
        );
    }

    #[tokio::test]
    async fn public_url_path_style_with_endpoint() {
        let backend = backend(Some("minio:9000")).await;
        assert_eq!(
            backend.public_url("samples/kit.zip"),
            "http://minio:9000/packs/samples/kit%2Ezip"
        );
    }

    #[tokio::test]
    async fn full_key_applies_prefix() {
        let backend = S3Backend::new(
            "packs",
            None,
            None,
            Some("stash/".to_string()),
            None,
            None,
            false,
        )
        .await
        .unwrap();
        assert_eq!(backend.full_key("a/b"), "stash/a/b");
    }
}
