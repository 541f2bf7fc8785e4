//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        // Capability discovery
        .route("/v1/capabilities", get(handlers::get_capabilities))
        // Upload control plane
        .route("/v1/uploads", post(handlers::create_upload))
        .route("/v1/uploads/{upload_id}", get(handlers::get_upload))
        .route(
            "/v1/uploads/{upload_id}/chunks/{chunk_index}",
            put(handlers::upload_chunk),
        )
        // Direct small-file path, bypassing the session subsystem
        .route("/v1/files", post(handlers::direct_upload))
        // On-demand session eviction
        .route("/v1/admin/reap", post(handlers::reap_now));

    let mut router = Router::new().merge(api_routes);

    // Conditionally add metrics endpoint based on config.
    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    if state.config.server.metrics_enabled {
        router = router.merge(Router::new().route("/metrics", get(metrics_handler)));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
