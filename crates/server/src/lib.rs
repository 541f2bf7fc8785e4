//! HTTP upload relay server for Stash.
//!
//! Accepts chunked and direct file uploads, reassembles chunked sessions,
//! and relays finished payloads to an external object store with a public
//! link. See the `stash-store` and `stash-storage` crates for the session
//! and storage backends.

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod reaper;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
