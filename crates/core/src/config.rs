//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum size of a single chunk in bytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,
    /// Maximum number of chunks a session may declare.
    #[serde(default = "default_max_total_chunks")]
    pub max_total_chunks: u32,
    /// Maximum payload size for the direct (non-chunked) path in bytes.
    #[serde(default = "default_max_direct_size")]
    pub max_direct_size: u64,
    /// Fallback remote folder when the client does not name one.
    #[serde(default = "default_folder")]
    pub default_folder: String,
    /// Sessions idle longer than this are reaped, in seconds.
    #[serde(default = "default_session_max_age_secs")]
    pub session_max_age_secs: u64,
    /// How often the background reaper scans for idle sessions, in seconds.
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    /// Upper bound on any single remote storage call, in seconds.
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// When enabled, restrict the endpoint to scraper IPs at the
    /// infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_chunk_size() -> u64 {
    crate::DEFAULT_MAX_CHUNK_SIZE
}

fn default_max_total_chunks() -> u32 {
    crate::DEFAULT_MAX_TOTAL_CHUNKS
}

fn default_max_direct_size() -> u64 {
    crate::DEFAULT_MAX_DIRECT_SIZE
}

fn default_folder() -> String {
    "incoming".to_string()
}

fn default_session_max_age_secs() -> u64 {
    3600 // one hour
}

fn default_reap_interval_secs() -> u64 {
    60
}

fn default_remote_timeout_secs() -> u64 {
    300
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_chunk_size: default_max_chunk_size(),
            max_total_chunks: default_max_total_chunks(),
            max_direct_size: default_max_direct_size(),
            default_folder: default_folder(),
            session_max_age_secs: default_session_max_age_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            remote_timeout_secs: default_remote_timeout_secs(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Maximum idle age as a `time::Duration`.
    pub fn session_max_age(&self) -> time::Duration {
        let secs = i64::try_from(self.session_max_age_secs).unwrap_or(i64::MAX);
        time::Duration::seconds(secs)
    }

    /// Reaper scan interval.
    ///
    /// Returns a 60 second default when configured as zero, which would
    /// otherwise panic `tokio::time::interval`.
    pub fn reap_interval(&self) -> Duration {
        if self.reap_interval_secs == 0 {
            Duration::from_secs(60)
        } else {
            Duration::from_secs(self.reap_interval_secs)
        }
    }

    /// Remote storage call timeout.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs.max(1))
    }

    /// Validate server limits. Returns warnings for odd but workable
    /// settings and an error for settings the server cannot run with.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        if self.max_chunk_size == 0 {
            return Err("max_chunk_size must be positive".to_string());
        }
        if self.max_total_chunks == 0 {
            return Err("max_total_chunks must be positive".to_string());
        }
        if self.default_folder.is_empty() {
            return Err("default_folder must not be empty".to_string());
        }

        let mut warnings = Vec::new();
        if self.session_max_age_secs < self.reap_interval_secs {
            warnings.push(format!(
                "session_max_age_secs ({}) is below reap_interval_secs ({}); \
                 sessions may outlive their nominal age by a full scan interval",
                self.session_max_age_secs, self.reap_interval_secs
            ));
        }
        if self.max_direct_size > self.max_chunk_size * self.max_total_chunks as u64 {
            warnings.push(
                "max_direct_size exceeds the largest possible chunked upload".to_string(),
            );
        }
        Ok(warnings)
    }
}

/// Remote storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage (development and tests).
    Filesystem {
        /// Root directory for stored objects.
        path: PathBuf,
        /// Base URL prefixed to object keys to form public links.
        /// When unset, links are file:// URLs under the root.
        public_base_url: Option<String>,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the ambient credential chain if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO
        /// and some S3-compatible services; AWS S3 wants virtual-hosted style.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
            public_base_url: None,
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// Session store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-memory map. Sessions die with the process; suitable for
    /// single-instance deployments.
    Memory,
    /// SQLite-backed table. Sessions survive restarts.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote storage backend.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Session store backend.
    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Create a test configuration with in-memory sessions and a short
    /// expiry window.
    ///
    /// **For testing only.** The storage path is a placeholder the caller
    /// overrides with a temp directory.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
                session_max_age_secs: 60,
                reap_interval_secs: 1,
                ..Default::default()
            },
            storage: StorageConfig::default(),
            store: StoreConfig::Memory,
        }
    }
}
