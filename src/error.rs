// src/error.rs
//! Authentication failure taxonomy.
//!
//! Every step of the authentication pipeline returns [`AuthError`] by value;
//! nothing below the HTTP middleware builds a response. The middleware turns an
//! error into `{"reason": ..., "detail": ...}` with the status from
//! [`AuthError::status`]. Internal detail (resolver URLs, key errors, stack
//! context) goes to the log, never into the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Terminal outcome of a failed authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header on a protected path.
    #[error("Authorization header missing")]
    MissingAuthorization,

    /// The header names neither the DIDWba nor the Bearer scheme.
    #[error("Unsupported authorization type")]
    UnsupportedScheme,

    /// A DIDWba header is missing a required field or is not parseable.
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// The credential timestamp is unparseable, in the future, or too old.
    #[error("Invalid or expired timestamp")]
    TimestampInvalid,

    /// The nonce was already consumed by this DID.
    #[error("Nonce has already been used")]
    NonceReused,

    /// The request Host is not one of the configured serving domains.
    #[error("Invalid domain")]
    DomainNotServed,

    /// The DID document could not be fetched or decoded.
    #[error("DID resolution failed: {0}")]
    ResolutionFailure(String),

    /// No key in the DID document validates the signature.
    #[error("Authentication failed")]
    SignatureInvalid,

    /// A bearer token whose lifetime has elapsed.
    #[error("Token has expired")]
    TokenExpired,

    /// A bearer token that does not verify against the service key.
    #[error("Invalid token")]
    TokenInvalid,

    /// The token signing key is absent or unusable.
    #[error("Server configuration error")]
    SigningUnavailable,

    /// Anything that does not fit the categories above.
    #[error("Internal server error")]
    Internal(String),
}

impl AuthError {
    /// HTTP status the failure maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthorization
            | AuthError::UnsupportedScheme
            | AuthError::MalformedCredential(_)
            | AuthError::TimestampInvalid
            | AuthError::NonceReused
            | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::DomainNotServed => StatusCode::BAD_REQUEST,
            AuthError::SignatureInvalid | AuthError::TokenInvalid => StatusCode::FORBIDDEN,
            AuthError::ResolutionFailure(_)
            | AuthError::SigningUnavailable
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable, machine-readable label returned to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization => "missing header",
            AuthError::UnsupportedScheme => "unsupported scheme",
            AuthError::MalformedCredential(_) => "malformed credential",
            AuthError::TimestampInvalid => "invalid timestamp",
            AuthError::NonceReused => "nonce reused",
            AuthError::DomainNotServed => "invalid domain",
            AuthError::ResolutionFailure(_) => "resolution failure",
            AuthError::SignatureInvalid => "signature invalid",
            AuthError::TokenExpired => "token expired",
            AuthError::TokenInvalid => "token invalid",
            AuthError::SigningUnavailable => "signing unavailable",
            AuthError::Internal(_) => "internal error",
        }
    }

    /// Client-facing message. Server-side variants hide their inner detail.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::ResolutionFailure(_) => "Unable to resolve DID document".to_string(),
            AuthError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// True for failures caused by the server rather than the caller.
    pub fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = json!({
            "reason": self.reason(),
            "detail": self.public_message(),
        });
        (self.status(), Json(body)).into_response()
    }
}
