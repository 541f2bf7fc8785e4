//! Stash server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use stash_core::config::AppConfig;
use stash_server::{AppState, create_router};
use stash_storage::RemoteStore;
use stash_store::SessionStore;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stash - chunked upload relay for sample-pack distribution
#[derive(Parser, Debug)]
#[command(name = "stashd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "STASH_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Startup banner
    tracing::info!("Stash v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    // Check for STASH_ environment variables (excluding STASH_CONFIG which is just the path)
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("STASH_") && key != "STASH_CONFIG");

    if !has_config_file && !has_env_config {
        tracing::info!(
            "No configuration provided; running with built-in defaults \
             (in-memory sessions, filesystem storage under ./data/storage)"
        );
    } else if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("STASH_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Register Prometheus metrics
    stash_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    // Initialize remote storage backend
    let storage = stash_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    // Verify storage connectivity before accepting requests.
    // This catches configuration errors and connectivity issues early,
    // preventing the server from reporting healthy when storage is unreachable.
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!("Storage backend connectivity verified");

    // Initialize session store
    let sessions = stash_store::from_config(&config.store)
        .await
        .context("failed to initialize session store")?;
    sessions
        .health_check()
        .await
        .context("session store health check failed")?;
    tracing::info!(backend = sessions.backend_name(), "Session store initialized");

    // Create application state
    let state = AppState::new(config.clone(), sessions, storage);

    // Spawn the background session reaper
    let _reaper_handle = stash_server::reaper::spawn(state.clone());
    tracing::info!(
        interval_secs = state.config.server.reap_interval().as_secs(),
        max_age_secs = state.config.server.session_max_age_secs,
        "Session reaper spawned"
    );

    // Create router
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
