use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// The route guard pipeline, leaves first.
pub mod session;
pub mod auth;
pub mod access;
pub mod guard;

// Application services and components.
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;

// Routers grouped by access class (Public, Authenticated, User, Admin).
pub mod routes;
use routes::{admin, authenticated, public, user};

// --- Public Re-exports ---

pub use access::{AccessDecision, AccessRules, AccessState, PathClass};
pub use auth::AuthUser;
pub use config::AppConfig;
pub use session::{MockSessionProvider, SessionState, SupabaseSessionProvider};

/// ApiDoc
///
/// OpenAPI document for the page shells, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::home, handlers::login_page, handlers::unauthorized_page,
        handlers::get_me, handlers::user_dashboard, handlers::admin_dashboard
    ),
    components(
        schemas(
            models::HomeResponse, models::LoginResponse, models::AccessDeniedResponse,
            models::UserProfile, models::DashboardResponse, models::UnauthorizedParams,
        )
    ),
    tags(
        (name = "skill-swap", description = "Skill Swap marketplace pages")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container shared by every request: the injected identity
/// provider and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    /// Session Resolver backend (Supabase in production, a mock in tests).
    pub session: SessionState,
    pub config: AppConfig,
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.session.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Mounts every page behind the route guard, then the operational endpoints
/// (`/health`, Swagger UI) outside it, then the observability layers.
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    // Guarded pages. The fallback is registered before `layer` so unknown paths are
    // guarded (and redirected) like any other default-protected path.
    let guarded = Router::new()
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(user::user_routes())
        .merge(admin::admin_routes())
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::route_guard,
        ));

    let base_router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(guarded)
        .with_state(state);

    base_router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of one request carries its
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
