use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{StatusCode, request::Parts},
};
use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::{access::USER_ROLE, models::UserProfile};

/// base64url with optional padding. JWT segments are unpadded, but tolerate either.
pub(crate) const BASE64_URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Payload field carrying the caller's role.
pub const ROLE_CLAIM: &str = "user_role";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),

    #[error("token payload is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token payload is not a JSON claims object: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("user_role claim must be a string, found {0}")]
    RoleType(Value),
}

/// decode_role
///
/// Extracts the `user_role` claim from a session's bearer token.
///
/// Only the payload segment is decoded. The signature is **not** verified: the token is
/// trusted solely because the session resolver obtained it from a provider-issued
/// cookie. Do not use this as a general-purpose token verifier.
///
/// A well-formed token whose claim is missing, null or empty yields `"user"`. A
/// malformed token is an error, never a default role.
pub fn decode_role(token: &str) -> Result<String, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::SegmentCount(segments.len()));
    }

    let payload = BASE64_URL_LENIENT.decode(segments[1])?;
    let claims: Map<String, Value> = serde_json::from_slice(&payload)?;

    match claims.get(ROLE_CLAIM) {
        None | Some(Value::Null) => Ok(USER_ROLE.to_string()),
        Some(Value::String(role)) if role.is_empty() => Ok(USER_ROLE.to_string()),
        Some(Value::String(role)) => Ok(role.clone()),
        Some(other) => Err(TokenError::RoleType(other.clone())),
    }
}

/// AuthUser
///
/// The resolved identity of a request that passed the guard with a session. The guard
/// places it in the request extensions; handlers take it as an argument.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    /// The provider's user id (auth.users.id).
    pub id: Uuid,
    pub email: Option<String>,
    /// Decoded role claim, `"user"` when the token carries none.
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == crate::access::ADMIN_ROLE
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

/// Rejects with 401 when the guard attached no identity, which only happens on public
/// paths without a session or on routes mounted outside the guard.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().cloned())
    }
}
