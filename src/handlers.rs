use axum::{Json, extract::Query, http::StatusCode};

use crate::{
    access::ADMIN_ROLE,
    auth::AuthUser,
    models::{
        AccessDeniedResponse, DashboardResponse, HomeResponse, LoginResponse, UnauthorizedQuery,
        UserProfile,
    },
};

// --- Public Pages ---

/// home
///
/// [Public Route] Landing page. Reports whether the guard resolved a session.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Landing page", body = HomeResponse))
)]
pub async fn home(user: Option<AuthUser>) -> Json<HomeResponse> {
    let message = match &user {
        Some(user) => format!("Welcome back. You are signed in as {}.", user.role),
        None => "Browse public profiles and trade skills. Sign in to request a swap.".to_string(),
    };

    Json(HomeResponse {
        message,
        signed_in: user.is_some(),
        user: user.as_ref().map(AuthUser::profile),
    })
}

/// login_page
///
/// [Public Route] Where the guard sends callers without a session. Signing in itself
/// happens against the identity provider from the browser.
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login landing", body = LoginResponse))
)]
pub async fn login_page(user: Option<AuthUser>) -> Json<LoginResponse> {
    let message = if user.is_some() {
        "You are already signed in."
    } else {
        "Sign in with your email and password to continue."
    };

    Json(LoginResponse {
        message: message.to_string(),
        signed_in: user.is_some(),
    })
}

/// unauthorized_page
///
/// [Public Route] Where the guard sends callers whose role does not fit the path.
/// Missing or empty parameters fall back to `unknown` / `unknown` / `admin`.
#[utoipa::path(
    get,
    path = "/unauthorized",
    params(UnauthorizedQuery),
    responses((status = 200, description = "Access denied", body = AccessDeniedResponse))
)]
pub async fn unauthorized_page(Query(query): Query<UnauthorizedQuery>) -> Json<AccessDeniedResponse> {
    let user_role = non_empty(query.user_role).unwrap_or_else(|| "unknown".to_string());
    let path_tried = non_empty(query.path_tried).unwrap_or_else(|| "unknown".to_string());
    let correct_role = non_empty(query.correct_role).unwrap_or_else(|| ADMIN_ROLE.to_string());

    let message = format!(
        "You are logged in as a {user_role}. You cannot access /{path_tried}. \
         Log in again with a {correct_role} account."
    );

    Json(AccessDeniedResponse {
        user_role,
        path_tried,
        correct_role,
        message,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// --- Signed-in Pages ---

/// get_me
///
/// [Authenticated Route] The caller's identity as resolved by the guard.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Current profile", body = UserProfile),
        (status = 307, description = "No session, redirected to /login")
    )
)]
pub async fn get_me(user: AuthUser) -> Json<UserProfile> {
    Json(user.profile())
}

/// user_dashboard
///
/// [User Route] Reachable with the `user` or `admin` role.
#[utoipa::path(
    get,
    path = "/user",
    responses((status = 200, description = "User dashboard", body = DashboardResponse))
)]
pub async fn user_dashboard(user: AuthUser) -> Json<DashboardResponse> {
    Json(DashboardResponse {
        scope: "user".to_string(),
        user: user.profile(),
    })
}

/// admin_dashboard
///
/// [Admin Route] Reachable only with the `admin` role; the guard has already
/// redirected everyone else.
#[utoipa::path(
    get,
    path = "/admin",
    responses((status = 200, description = "Admin dashboard", body = DashboardResponse))
)]
pub async fn admin_dashboard(user: AuthUser) -> Json<DashboardResponse> {
    Json(DashboardResponse {
        scope: ADMIN_ROLE.to_string(),
        user: user.profile(),
    })
}

/// Fallback for signed-in callers on paths no page serves.
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}
