use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// User Router Module
///
/// Everything under `/user`. Admins satisfy the user requirement.
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/user", get(handlers::user_dashboard))
}
