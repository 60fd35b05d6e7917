//! Outcomes that end a request before content is served.

use crate::body::{error_response, ServeBody};
use hyper::{Response, StatusCode};
use thiserror::Error;

/// Terminal failure of the serving pipeline. The message is echoed to the
/// client inside the error envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServeError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Global rate limit exceeded.")]
    RateLimited,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

impl ServeError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServeError::Validation(_) => StatusCode::BAD_REQUEST,
            ServeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServeError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServeError::NotFound(_) => StatusCode::NOT_FOUND,
            ServeError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label for the `outcome` dimension of the request counter.
    pub fn outcome(&self) -> &'static str {
        match self {
            ServeError::Validation(_) => "invalid",
            ServeError::Unauthorized(_) => "unauthorized",
            ServeError::RateLimited => "rate_limited",
            ServeError::NotFound(_) => "not_found",
            ServeError::Upstream(_) => "upstream_error",
            ServeError::Internal(_) => "error",
        }
    }

    pub fn into_response(self) -> Response<ServeBody> {
        error_response(self.status(), &self.to_string())
    }
}
