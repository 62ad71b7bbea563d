//! here/now API crate - axum HTTP server, route handlers, widget delivery.
//!
//! Provides the collection endpoints (/api/track, /api/stats), the
//! generated instrumentation script (/widget.js), the TTL-bounded
//! stats cache, and health/info endpoints.

pub mod cache;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod widget;

pub use cache::StatsCache;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
