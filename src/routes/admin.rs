use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Everything under `/admin`. Callers without the `admin` role never reach these
/// handlers: the guard redirects them to `/unauthorized` with diagnostic parameters,
/// or to `/login` when they have no session at all.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin", get(handlers::admin_dashboard))
}
