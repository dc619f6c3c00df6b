use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
    middleware,
    response::Response,
    routing::get,
};
use axum_extra::extract::cookie::Cookie;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use skill_swap_portal::{
    AppConfig, AppState, MockSessionProvider, create_router, guard,
    session::{Session, SessionUser, removal_cookies},
};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// --- Test Utilities ---

const TEST_USER_ID: Uuid = Uuid::from_u128(42);

fn token_for(role: Option<&str>) -> String {
    let claims = match role {
        Some(role) => json!({ "sub": TEST_USER_ID, "user_role": role }),
        None => json!({ "sub": TEST_USER_ID }),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"provider-secret"),
    )
    .unwrap()
}

fn session_with_token(access_token: String) -> Session {
    Session {
        access_token,
        refresh_token: "refresh-token".to_string(),
        token_type: Some("bearer".to_string()),
        expires_in: Some(3600),
        expires_at: Some(chrono::Utc::now().timestamp() + 3600),
        user: SessionUser {
            id: TEST_USER_ID,
            email: Some("member@example.com".to_string()),
        },
    }
}

fn signed_in(role: Option<&str>) -> MockSessionProvider {
    MockSessionProvider::signed_in(session_with_token(token_for(role)))
}

fn refreshed_cookie() -> Cookie<'static> {
    Cookie::build(("sb-127-auth-token", "base64-renewed"))
        .path("/")
        .build()
}

fn state(provider: MockSessionProvider) -> AppState {
    AppState {
        session: Arc::new(provider),
        config: AppConfig::default(),
    }
}

fn app(provider: MockSessionProvider) -> Router {
    create_router(state(provider))
}

async fn get_path(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- No Session ---

#[tokio::test]
async fn test_public_paths_without_session_pass() {
    for path in ["/", "/login", "/unauthorized"] {
        let response = get_path(app(MockSessionProvider::anonymous()), path).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
async fn test_home_reports_anonymous_visit() {
    let response = get_path(app(MockSessionProvider::anonymous()), "/").await;
    let body = json_body(response).await;
    assert_eq!(body["signed_in"], false);
    assert!(body.get("user").is_none());
}

#[tokio::test]
async fn test_user_path_without_session_redirects_to_login() {
    let response = get_path(app(MockSessionProvider::anonymous()), "/user").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_admin_path_without_session_redirects_to_login() {
    let response = get_path(app(MockSessionProvider::anonymous()), "/admin/dashboard").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_unknown_path_without_session_redirects_to_login() {
    let response = get_path(app(MockSessionProvider::anonymous()), "/swap-requests").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_login_redirect_drops_query_context() {
    let response = get_path(app(MockSessionProvider::anonymous()), "/settings?tab=skills").await;
    assert_eq!(location(&response), "/login");
}

// --- Role Checks ---

#[tokio::test]
async fn test_admin_path_as_user_redirects_to_unauthorized() {
    let response = get_path(app(signed_in(Some("user"))), "/admin").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "/unauthorized?user_role=user&path_tried=admin&correct_role=admin"
    );
}

#[tokio::test]
async fn test_nested_admin_path_as_user_encodes_path() {
    let response = get_path(app(signed_in(None)), "/admin/users/3").await;
    assert_eq!(
        location(&response),
        "/unauthorized?user_role=user&path_tried=admin%2Fusers%2F3&correct_role=admin"
    );
}

#[tokio::test]
async fn test_admin_path_as_admin_passes() {
    let response = get_path(app(signed_in(Some("admin"))), "/admin").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["scope"], "admin");
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["id"], TEST_USER_ID.to_string());
}

#[tokio::test]
async fn test_user_path_as_admin_passes() {
    let response = get_path(app(signed_in(Some("admin"))), "/user").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["scope"], "user");
}

#[tokio::test]
async fn test_user_path_without_claim_passes_as_user() {
    let response = get_path(app(signed_in(None)), "/user").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["user"]["role"], "user");
}

#[tokio::test]
async fn test_user_path_with_unknown_role_redirects() {
    let response = get_path(app(signed_in(Some("moderator"))), "/user").await;
    assert_eq!(
        location(&response),
        "/unauthorized?user_role=moderator&path_tried=user&correct_role=user"
    );
}

#[tokio::test]
async fn test_default_protected_path_accepts_any_session() {
    let response = get_path(app(signed_in(Some("moderator"))), "/settings").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["role"], "moderator");
    assert_eq!(body["email"], "member@example.com");
}

#[tokio::test]
async fn test_unknown_path_with_session_is_not_found() {
    let response = get_path(app(signed_in(None)), "/no-such-page").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_home_reports_signed_in_identity() {
    let response = get_path(app(signed_in(Some("admin"))), "/").await;
    let body = json_body(response).await;
    assert_eq!(body["signed_in"], true);
    assert_eq!(body["user"]["role"], "admin");
}

// --- Failure Modes ---

#[tokio::test]
async fn test_malformed_token_fails_the_request() {
    let provider = MockSessionProvider::signed_in(session_with_token("not-a-jwt".to_string()));
    let response = get_path(app(provider), "/user").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_malformed_token_fails_even_on_public_path() {
    let provider = MockSessionProvider::signed_in(session_with_token("a.%%%.c".to_string()));
    let response = get_path(app(provider), "/").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_refreshed_cookies_survive_malformed_token() {
    let provider = MockSessionProvider::signed_in(session_with_token("bad".to_string()))
        .with_refreshed(vec![refreshed_cookie()]);
    let response = get_path(app(provider), "/").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("sb-127-auth-token=base64-renewed"));
}

#[tokio::test]
async fn test_empty_role_claim_reaches_user_area() {
    let provider = MockSessionProvider::signed_in(session_with_token(token_for(Some(""))));
    let response = get_path(app(provider), "/user").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["user"]["role"], "user");
}

#[tokio::test]
async fn test_provider_failure_is_treated_as_no_session() {
    let response = get_path(app(MockSessionProvider::new_failing()), "/user").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");

    let response = get_path(app(MockSessionProvider::new_failing()), "/").await;
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Response Rewriter ---

#[tokio::test]
async fn test_refreshed_cookies_forwarded_on_pass_through() {
    let provider = signed_in(Some("user")).with_refreshed(vec![refreshed_cookie()]);
    let response = get_path(app(provider), "/profile").await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("sb-127-auth-token=base64-renewed"));
}

#[tokio::test]
async fn test_refreshed_cookies_forwarded_on_unauthorized_redirect() {
    let provider = signed_in(Some("user")).with_refreshed(vec![refreshed_cookie()]);
    let response = get_path(app(provider), "/admin").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(set_cookies(&response)[0].starts_with("sb-127-auth-token=base64-renewed"));
}

#[tokio::test]
async fn test_removal_cookies_forwarded_on_login_redirect() {
    let removals = removal_cookies(&["sb-127-auth-token.0".to_string(), "sb-127-auth-token.1".to_string()]);
    let provider = MockSessionProvider::anonymous().with_refreshed(removals);
    let response = get_path(app(provider), "/user").await;

    assert_eq!(location(&response), "/login");
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
}

#[tokio::test]
async fn test_handlers_observe_refreshed_cookies() {
    let provider = signed_in(Some("user")).with_refreshed(vec![refreshed_cookie()]);
    let state = state(provider);

    let echo = Router::new()
        .route(
            "/echo",
            get(|headers: HeaderMap| async move {
                headers
                    .get(header::COOKIE)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            }),
        )
        .layer(middleware::from_fn_with_state(state.clone(), guard::route_guard))
        .with_state(state);

    let response = echo
        .oneshot(
            Request::builder()
                .uri("/echo")
                .header(header::COOKIE, "sb-127-auth-token=base64-stale; theme=dark")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let seen = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(seen.contains("sb-127-auth-token=base64-renewed"));
    assert!(seen.contains("theme=dark"));
    assert!(!seen.contains("base64-stale"));
}

// --- Operational Endpoints ---

#[tokio::test]
async fn test_health_is_outside_the_guard() {
    let response = get_path(app(MockSessionProvider::anonymous()), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let response = get_path(app(MockSessionProvider::anonymous()), "/").await;
    assert!(response.headers().contains_key("x-request-id"));
}
