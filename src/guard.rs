use axum::{
    extract::{Request, State},
    http::{
        HeaderValue,
        header::{COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::{
    AppState,
    auth::{AuthUser, decode_role},
    error::AppError,
    session::{self, SessionLookup},
};

/// route_guard
///
/// Runs once per request, before any page handler, strictly in order:
/// 1. Session Resolver: ask the provider for the session (the only await).
/// 2. Claim Decoder: read the role from the session's bearer token.
/// 3. Path Classifier and Access Decision Engine: allow or pick a redirect.
/// 4. Response Rewriter: forward the provider's cookies onto the final response.
///
/// A malformed token aborts the request with 500 instead of defaulting the role. The
/// provider's cookies are forwarded on that response too.
pub async fn route_guard(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let lookup = session::resolve(state.session.as_ref(), &jar).await;

    let mut response = match identify(&lookup) {
        Ok(identity) => decide(&state, request, next, jar, &lookup, identity).await,
        Err(e) => e.into_response(),
    };

    forward_cookies(&mut response, &lookup.cookies);
    response
}

/// The identity behind the resolved session, if any.
fn identify(lookup: &SessionLookup) -> Result<Option<AuthUser>, AppError> {
    let Some(session) = &lookup.session else {
        return Ok(None);
    };

    Ok(Some(AuthUser {
        id: session.user.id,
        email: session.user.email.clone(),
        role: decode_role(&session.access_token)?,
    }))
}

/// Pass-through or redirect for a request whose identity is settled.
async fn decide(
    state: &AppState,
    mut request: Request,
    next: Next,
    jar: CookieJar,
    lookup: &SessionLookup,
    identity: Option<AuthUser>,
) -> Response {
    let path = request.uri().path().to_string();
    let rules = &state.config.access;
    let decision = rules.evaluate(&path, identity.as_ref().map(|user| user.role.as_str()));

    match rules.redirect_target(&decision) {
        None => {
            tracing::debug!(path = %path, signed_in = identity.is_some(), "access allowed");
            if !lookup.cookies.is_empty() {
                rewrite_request_cookies(&mut request, jar, lookup);
            }
            if let Some(user) = identity {
                request.extensions_mut().insert(user);
            }
            next.run(request).await
        }
        Some(target) => {
            tracing::info!(path = %path, ?decision, target = %target, "access denied, redirecting");
            Redirect::temporary(&target).into_response()
        }
    }
}

/// forward_cookies
///
/// Appends every session-continuity cookie as a `Set-Cookie` header. Applied to every
/// response the guard returns; skipping it desynchronizes the client's session from
/// the provider's.
pub fn forward_cookies(response: &mut Response, cookies: &[Cookie<'static>]) {
    for cookie in cookies {
        match session::set_cookie_value(cookie) {
            Some(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            None => {
                tracing::warn!(cookie = cookie.name(), "dropping cookie with invalid header value")
            }
        }
    }
}

/// Makes the downstream handlers see the renewed session instead of the stale one the
/// browser sent.
fn rewrite_request_cookies(request: &mut Request, jar: CookieJar, lookup: &SessionLookup) {
    let jar = lookup.cookies.iter().fold(jar, |jar, cookie| {
        if session::is_removal(cookie) {
            jar.remove(Cookie::from(cookie.name().to_owned()))
        } else {
            jar.add(cookie.clone())
        }
    });

    let header = jar
        .iter()
        .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
        .collect::<Vec<_>>()
        .join("; ");

    let headers = request.headers_mut();
    if header.is_empty() {
        headers.remove(COOKIE);
    } else if let Ok(value) = HeaderValue::from_str(&header) {
        headers.insert(COOKIE, value);
    }
}
