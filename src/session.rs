use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::http::HeaderValue;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{auth::BASE64_URL_LENIENT, config::AppConfig};

/// Prefix marking a base64url-encoded cookie value.
pub const BASE64_PREFIX: &str = "base64-";
/// Longest value written into a single cookie before the session is split into chunks.
pub const MAX_CHUNK_SIZE: usize = 3180;
/// Upper bound on chunk indices probed when reading a stored session.
const MAX_CHUNKS: usize = 32;
/// Lifetime of the session cookies the provider writes (400 days).
const COOKIE_MAX_AGE_DAYS: i64 = 400;

/// SessionUser
///
/// The part of the provider's user record the guard keeps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session
///
/// An authenticated identity as stored in the provider's cookie, and as returned by
/// the token refresh endpoint. Read-only for the guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

impl Session {
    /// True when the session expires within `margin_secs` of `now`. A session without
    /// an expiry is never considered stale.
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - now < margin_secs)
    }
}

/// SessionLookup
///
/// The provider's answer for one request. `cookies` are session-continuity cookies
/// (renewed or removed) that must reach the client on whatever response is returned.
#[derive(Debug, Clone, Default)]
pub struct SessionLookup {
    pub session: Option<Session>,
    pub cookies: Vec<Cookie<'static>>,
}

impl SessionLookup {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("identity provider returned an unreadable session: {0}")]
    Decode(String),
}

// 1. SessionProvider Contract
/// SessionProvider
///
/// "Get the current session for these cookies." The only call the guard makes on the
/// identity provider. Implementations may renew the session and report the renewed
/// cookies in the lookup.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn get_session(&self, jar: &CookieJar) -> Result<SessionLookup, SessionError>;
}

/// SessionState
///
/// The concrete type used to share the provider across the application state.
pub type SessionState = Arc<dyn SessionProvider>;

/// resolve
///
/// Asks the provider for the session and waits for the answer before anything else
/// runs. A failed lookup is indistinguishable from an anonymous visit.
pub async fn resolve(provider: &dyn SessionProvider, jar: &CookieJar) -> SessionLookup {
    match provider.get_session(jar).await {
        Ok(lookup) => lookup,
        Err(e) => {
            tracing::warn!(error = %e, "session lookup failed, treating request as anonymous");
            SessionLookup::anonymous()
        }
    }
}

// 2. The Real Implementation (Supabase Auth)
/// SupabaseSessionProvider
///
/// Reads the session the Supabase SSR client keeps in `sb-<ref>-auth-token` cookies
/// and renews it through the Auth API when it is about to expire.
#[derive(Clone)]
pub struct SupabaseSessionProvider {
    client: reqwest::Client,
    auth_url: String,
    anon_key: String,
    storage_key: String,
    refresh_margin_secs: i64,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

impl SupabaseSessionProvider {
    pub fn new(config: &AppConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.supabase_timeout_secs))
            .build()?;

        Ok(Self::with_client(client, config))
    }

    /// Builds the provider around an existing HTTP client.
    pub fn with_client(client: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            client,
            auth_url: format!("{}/auth/v1", config.supabase_url.trim_end_matches('/')),
            anon_key: config.supabase_anon_key.clone(),
            storage_key: config.session_storage_key(),
            refresh_margin_secs: config.refresh_margin_secs,
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// refresh
    ///
    /// `Ok(None)` means the provider rejected the refresh token (4xx): the stored session
    /// is dead and must be cleared. Transport failures and 5xx are errors.
    async fn refresh(&self, refresh_token: &str) -> Result<Option<Session>, SessionError> {
        let response = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            tracing::info!(status = status.as_u16(), "refresh token rejected, clearing session");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut session = response.json::<Session>().await?;
        if session.expires_at.is_none() {
            session.expires_at = session
                .expires_in
                .map(|expires_in| Utc::now().timestamp() + expires_in);
        }
        Ok(Some(session))
    }
}

#[async_trait]
impl SessionProvider for SupabaseSessionProvider {
    async fn get_session(&self, jar: &CookieJar) -> Result<SessionLookup, SessionError> {
        let stored = read_stored_cookies(jar, &self.storage_key);
        let Some(raw) = stored.value() else {
            return Ok(SessionLookup::anonymous());
        };

        let session = match decode_session_value(&raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable stored session");
                return Ok(SessionLookup {
                    session: None,
                    cookies: removal_cookies(&stored.names),
                });
            }
        };

        if !session.expires_within(Utc::now().timestamp(), self.refresh_margin_secs) {
            return Ok(SessionLookup {
                session: Some(session),
                cookies: Vec::new(),
            });
        }

        tracing::debug!(user_id = %session.user.id, "stored session near expiry, refreshing");
        match self.refresh(&session.refresh_token).await? {
            Some(renewed) => {
                let cookies = session_cookies(&self.storage_key, &renewed, &stored.names)?;
                Ok(SessionLookup {
                    session: Some(renewed),
                    cookies,
                })
            }
            None => Ok(SessionLookup {
                session: None,
                cookies: removal_cookies(&stored.names),
            }),
        }
    }
}

// --- Cookie Storage Format ---

/// The cookies holding one stored session, in order.
#[derive(Debug, Default)]
pub struct StoredCookies {
    pub names: Vec<String>,
    values: Vec<String>,
}

impl StoredCookies {
    /// The reassembled value, or `None` when nothing is stored.
    pub fn value(&self) -> Option<String> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.concat())
        }
    }
}

/// Collects the stored session: the unsplit `<key>` cookie if present, otherwise the
/// consecutive chunks `<key>.0`, `<key>.1`, ...
pub fn read_stored_cookies(jar: &CookieJar, key: &str) -> StoredCookies {
    if let Some(cookie) = jar.get(key) {
        return StoredCookies {
            names: vec![key.to_string()],
            values: vec![cookie.value().to_string()],
        };
    }

    let mut stored = StoredCookies::default();
    for index in 0..MAX_CHUNKS {
        let name = format!("{key}.{index}");
        match jar.get(&name) {
            Some(cookie) => {
                stored.values.push(cookie.value().to_string());
                stored.names.push(name);
            }
            None => break,
        }
    }
    stored
}

pub fn decode_session_value(raw: &str) -> Result<Session, SessionError> {
    let json = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            let bytes = BASE64_URL_LENIENT
                .decode(encoded)
                .map_err(|e| SessionError::Decode(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| SessionError::Decode(e.to_string()))?
        }
        None => raw.to_string(),
    };

    serde_json::from_str(&json).map_err(|e| SessionError::Decode(e.to_string()))
}

pub fn encode_session_value(session: &Session) -> Result<String, SessionError> {
    let json = serde_json::to_string(session).map_err(|e| SessionError::Decode(e.to_string()))?;
    Ok(format!(
        "{BASE64_PREFIX}{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
    ))
}

/// session_cookies
///
/// Cookies that store `session` under `key`: a single cookie when the encoded value
/// fits, otherwise numbered chunks. Any previously stored name not rewritten is removed.
pub fn session_cookies(
    key: &str,
    session: &Session,
    previous: &[String],
) -> Result<Vec<Cookie<'static>>, SessionError> {
    let value = encode_session_value(session)?;

    let chunks: Vec<(String, String)> = if value.len() <= MAX_CHUNK_SIZE {
        vec![(key.to_string(), value)]
    } else {
        // The encoded value is ASCII, so byte offsets are char boundaries.
        value
            .as_bytes()
            .chunks(MAX_CHUNK_SIZE)
            .enumerate()
            .map(|(index, chunk)| {
                (
                    format!("{key}.{index}"),
                    String::from_utf8_lossy(chunk).into_owned(),
                )
            })
            .collect()
    };

    let stale: Vec<String> = previous
        .iter()
        .filter(|name| !chunks.iter().any(|(written, _)| written == *name))
        .cloned()
        .collect();

    let mut cookies: Vec<Cookie<'static>> = chunks
        .into_iter()
        .map(|(name, value)| {
            Cookie::build((name, value))
                .path("/")
                .same_site(SameSite::Lax)
                .max_age(time::Duration::days(COOKIE_MAX_AGE_DAYS))
                .build()
        })
        .collect();
    cookies.extend(removal_cookies(&stale));
    Ok(cookies)
}

/// Expiring cookies for each of `names`.
pub fn removal_cookies(names: &[String]) -> Vec<Cookie<'static>> {
    names
        .iter()
        .map(|name| {
            Cookie::build((name.clone(), ""))
                .path("/")
                .same_site(SameSite::Lax)
                .max_age(time::Duration::ZERO)
                .build()
        })
        .collect()
}

/// True for a cookie written by `removal_cookies`.
pub fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.value().is_empty() && cookie.max_age() == Some(time::Duration::ZERO)
}

/// `Set-Cookie` header value for `cookie`.
pub fn set_cookie_value(cookie: &Cookie<'_>) -> Option<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string()).ok()
}

// 3. The Mock Implementation (For Tests)
/// MockSessionProvider
///
/// Answers every lookup with a canned session and canned refreshed cookies, or fails
/// when `should_fail` is set.
#[derive(Clone, Default)]
pub struct MockSessionProvider {
    pub session: Option<Session>,
    pub refreshed: Vec<Cookie<'static>>,
    /// When true, every lookup returns a simulated provider outage.
    pub should_fail: bool,
}

impl MockSessionProvider {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(session: Session) -> Self {
        Self {
            session: Some(session),
            ..Self::default()
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn with_refreshed(mut self, cookies: Vec<Cookie<'static>>) -> Self {
        self.refreshed = cookies;
        self
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn get_session(&self, _jar: &CookieJar) -> Result<SessionLookup, SessionError> {
        if self.should_fail {
            return Err(SessionError::Status {
                status: 503,
                body: "Mock Session Error: Simulation requested".to_string(),
            });
        }

        Ok(SessionLookup {
            session: self.session.clone(),
            cookies: self.refreshed.clone(),
        })
    }
}
