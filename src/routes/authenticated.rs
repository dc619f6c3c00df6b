use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Paths outside the allowlist and the scoped prefixes. The guard only requires that a
/// session exists; the role is not checked.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /profile
        .route("/profile", get(handlers::get_me))
        // GET /settings
        // Same identity view, reached from the settings screen.
        .route("/settings", get(handlers::get_me))
}
