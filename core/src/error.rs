//! Failure taxonomy and its mapping onto HTTP status codes.
//!
//! # Design
//! Every failure the core can produce is one `HttpError` variant, and every
//! variant has exactly one status code (`HttpError::status`). The
//! dispatcher is the only place these are turned into response envelopes,
//! so the table below is the whole error policy:
//!
//! | variant             | status |
//! |---------------------|--------|
//! | `InvalidMethod`     | 400    |
//! | `BadRequest`        | 400    |
//! | `ValidationError`   | 400    |
//! | `NotFound`          | 404    |
//! | `UnsupportedMethod` | 405    |
//! | `Mapped`            | 407, 412, 413, 416 or 429 |
//! | `Internal`          | 500    |
//!
//! `Internal` messages are logged but never echoed to the client.

use thiserror::Error;

use crate::http::{status, HttpMethod};

/// Detail sent to clients in place of an internal error's message.
pub const INTERNAL_ERROR_DETAIL: &str = "Unexpected internal error";

/// Errors raised while normalizing or dispatching a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The method (or the tunnelled override) is not one we accept.
    #[error("invalid request method '{0}'")]
    InvalidMethod(String),

    /// The input was malformed or a required piece was missing.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Nothing is mapped at the URI, or the addressed resource is gone.
    #[error("{0}")]
    NotFound(String),

    /// The route exists but has no operation for this method.
    #[error("method {method} is not supported on '{uri}'")]
    UnsupportedMethod { method: HttpMethod, uri: String },

    /// A resource failed its construction contract.
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// Anything a controller did not anticipate.
    #[error("internal error: {0}")]
    Internal(String),

    /// A status raised by a deeper layer and passed through unchanged.
    #[error("{}", mapped_detail(*status, message))]
    Mapped { status: u16, message: String },
}

impl HttpError {
    pub fn proxy_authentication_required(message: impl Into<String>) -> Self {
        Self::mapped(status::PROXY_AUTHENTICATION_REQUIRED, message)
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::mapped(status::PRECONDITION_FAILED, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::mapped(status::PAYLOAD_TOO_LARGE, message)
    }

    pub fn range_not_satisfiable(message: impl Into<String>) -> Self {
        Self::mapped(status::RANGE_NOT_SATISFIABLE, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::mapped(status::TOO_MANY_REQUESTS, message)
    }

    fn mapped(status: u16, message: impl Into<String>) -> Self {
        HttpError::Mapped {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code for this failure.
    pub fn status(&self) -> u16 {
        match self {
            HttpError::InvalidMethod(_)
            | HttpError::BadRequest(_)
            | HttpError::ValidationError(_) => status::BAD_REQUEST,
            HttpError::NotFound(_) => status::NOT_FOUND,
            HttpError::UnsupportedMethod { .. } => status::METHOD_NOT_ALLOWED,
            HttpError::Internal(_) => status::INTERNAL_SERVER_ERROR,
            HttpError::Mapped { status, .. } => *status,
        }
    }

    /// Human-readable text safe to put in an error document.
    pub fn detail(&self) -> String {
        match self {
            HttpError::Internal(_) => INTERNAL_ERROR_DETAIL.to_string(),
            other => other.to_string(),
        }
    }
}

/// `"<reason phrase> - <message>"`, or just the phrase when there is no message.
fn mapped_detail(code: u16, message: &str) -> String {
    let reason = status::reason_phrase(code);
    if message.is_empty() {
        reason.to_string()
    } else {
        format!("{reason} - {message}")
    }
}
