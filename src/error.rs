use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::TokenError;

/// AppError
///
/// Request-level failures that abort the request instead of redirecting it.
#[derive(Debug, Error)]
pub enum AppError {
    /// The resolved session carried a token whose payload could not be decoded. This
    /// points at a broken integration and is never absorbed into a default role.
    #[error("malformed session token: {0}")]
    MalformedToken(#[from] TokenError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request aborted");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}
