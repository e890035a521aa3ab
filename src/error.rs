//! Crate-wide error taxonomy (spec §7).
//!
//! Subsystems raise their own `thiserror` enums (`StorageError`,
//! `FetchError`, `ManifestError`, ...) and convert into this one at the
//! boundary where a module is invoked by another, the way the teacher's
//! `config::ConfigError` wraps `ValidationError`/`ResolverError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("upstream io error: {0}")]
    UpstreamIO(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("denied: {0}")]
    Denied(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("storage io error: {0}")]
    StorageIO(String),

    #[error("database io error: {0}")]
    DatabaseIO(String),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Stable snake_case wire tag, used in the `{"error": "<kind>"}` envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Unauthorized(_) => "unauthorized",
            Error::UpstreamIO(_) => "upstream_io",
            Error::ChecksumMismatch { .. } => "checksum_mismatch",
            Error::Denied(_) => "denied",
            Error::Throttled(_) => "throttled",
            Error::Timeout(_) => "timeout",
            Error::Cancelled(_) => "cancelled",
            Error::StorageIO(_) => "storage_io",
            Error::DatabaseIO(_) => "database_io",
            Error::Fatal(_) => "fatal",
        }
    }

    /// HTTP status mapping per spec §7. Everything not explicitly listed
    /// there maps to 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Denied(_) => StatusCode::FORBIDDEN,
            Error::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorEnvelope {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::DatabaseIO(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::DatabaseIO(err.to_string())
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        Error::StorageIO(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else {
            Error::UpstreamIO(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_snake_case() {
        assert_eq!(Error::NotFound("x".into()).kind(), "not_found");
        assert_eq!(
            Error::ChecksumMismatch {
                expected: "a".into(),
                actual: "b".into()
            }
            .kind(),
            "checksum_mismatch"
        );
    }

    #[test]
    fn status_mapping_matches_spec() {
        assert_eq!(Error::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::InvalidInput("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::Denied("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Error::Throttled("x".into()).status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(Error::Fatal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
