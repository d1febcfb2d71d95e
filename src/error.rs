//! Error types: transport-level [`Error`] and the request-level error taxonomy.

use std::fmt;

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// The error type returned by the crate's fallible infrastructure operations.
///
/// Application-level errors (404, 422, etc.) are expressed as [`NextRushError`]
/// values carried through the pipeline, not as this type. `Error` surfaces
/// infrastructure failures: binding to a port, accepting a connection, or an
/// invalid listener configuration.
#[derive(Debug)]
pub struct Error(std::io::Error);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io: {}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}

/// The request-level error taxonomy.
///
/// Middleware and handlers raise these via [`crate::Context::throw`] /
/// [`crate::Context::assert`], or by returning one directly (it implements
/// [`crate::response::IntoResponse`]). They propagate to the exception-filter
/// chain owned by the orchestrator.
#[derive(Debug, Error)]
pub enum NextRushError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("too many requests: {0}")]
    TooManyRequests(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("request timeout: {0}")]
    Timeout(String),
}

impl NextRushError {
    /// The taxonomy tag used to select an exception filter.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BadRequest",
            Self::Validation(_) => "Validation",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "NotFound",
            Self::MethodNotAllowed(_) => "MethodNotAllowed",
            Self::Conflict(_) => "Conflict",
            Self::PayloadTooLarge(_) => "PayloadTooLarge",
            Self::UnsupportedMedia(_) => "UnsupportedMedia",
            Self::TooManyRequests(_) => "TooManyRequests",
            Self::Internal(_) => "Internal",
            Self::ServiceUnavailable(_) => "ServiceUnavailable",
            Self::Timeout(_) => "Timeout",
        }
    }

    /// The default HTTP status for this taxonomy tag.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// The user-visible message, independent of any structured `details`.
    pub fn message(&self) -> String {
        match self {
            Self::BadRequest(m)
            | Self::Validation(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::MethodNotAllowed(m)
            | Self::Conflict(m)
            | Self::PayloadTooLarge(m)
            | Self::UnsupportedMedia(m)
            | Self::TooManyRequests(m)
            | Self::Internal(m)
            | Self::ServiceUnavailable(m)
            | Self::Timeout(m) => m.clone(),
        }
    }

    /// Builds a taxonomy error from a raw HTTP status and message, as used
    /// by `ctx.throw(status, msg)`. Unrecognized statuses fall back to
    /// `Internal`.
    pub fn from_status(status: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match status {
            400 => Self::BadRequest(msg),
            401 => Self::Unauthorized(msg),
            403 => Self::Forbidden(msg),
            404 => Self::NotFound(msg),
            405 => Self::MethodNotAllowed(msg),
            409 => Self::Conflict(msg),
            413 => Self::PayloadTooLarge(msg),
            415 => Self::UnsupportedMedia(msg),
            422 => Self::Validation(msg),
            429 => Self::TooManyRequests(msg),
            503 => Self::ServiceUnavailable(msg),
            504 => Self::Timeout(msg),
            _ => Self::Internal(msg),
        }
    }

    /// Attaches structured detail to the error's eventual JSON body.
    pub fn with_details(self, details: Value) -> NextRushErrorWithDetails {
        NextRushErrorWithDetails { error: self, details: Some(details) }
    }
}

/// A [`NextRushError`] with optional structured `details`, the shape the
/// `GlobalExceptionFilter` actually serializes: `{error, statusCode,
/// details?, timestamp}`.
#[derive(Debug)]
pub struct NextRushErrorWithDetails {
    pub error: NextRushError,
    pub details: Option<Value>,
}

impl From<NextRushError> for NextRushErrorWithDetails {
    fn from(error: NextRushError) -> Self {
        Self { error, details: None }
    }
}

impl fmt::Display for NextRushErrorWithDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for NextRushErrorWithDetails {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
