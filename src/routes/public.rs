use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// The allowlist: `/`, `/login` and `/unauthorized`. These are also the two redirect
/// targets, so they must stay reachable without a session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Landing page. Shows the signed-in identity when there is one.
        .route("/", get(handlers::home))
        // GET /login
        // Target of the no-session redirect. Carries no parameters.
        .route("/login", get(handlers::login_page))
        // GET /unauthorized?user_role=..&path_tried=..&correct_role=..
        // Target of the wrong-role redirect.
        .route("/unauthorized", get(handlers::unauthorized_page))
}
