//! Error taxonomy surfaced by [`crate::ApiClient`].

use std::fmt;

use reqwest::{Method, Response, StatusCode};
use thiserror::Error;

use crate::api::store::StoreError;
use crate::config::ConfigError;

/// Metadata of a failed HTTP response, preserved for the caller's diagnostics.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub method: Method,
    pub url: String,
    pub status: StatusCode,
    pub body: String,
}

impl ErrorResponse {
    /// Consume a non-success response, keeping status and body text.
    pub(crate) async fn capture(method: &Method, url: &str, resp: Response) -> Self {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Self {
            method: method.clone(),
            url: url.to_string(),
            status,
            body,
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} returned {}", self.method, self.url, self.status)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (connection failure, timeout).
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 401 on a request that was already replayed with a refreshed token.
    #[error("Unauthorized: {0}")]
    Unauthorized(ErrorResponse),

    /// 401 that could not be recovered; stored credentials have been purged.
    #[error("Session expired: {0}")]
    CredentialLost(ErrorResponse),

    /// Any other non-success status.
    #[error("HTTP error: {0}")]
    Http(ErrorResponse),

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ApiError {
    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status)
    }

    /// The original response metadata, if one was received.
    pub fn response(&self) -> Option<&ErrorResponse> {
        match self {
            ApiError::Unauthorized(r) | ApiError::CredentialLost(r) | ApiError::Http(r) => Some(r),
            _ => None,
        }
    }

    /// True when the caller should send the user back to the login flow.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::CredentialLost(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: StatusCode) -> ErrorResponse {
        ErrorResponse {
            method: Method::GET,
            url: "http://localhost:5000/courses".to_string(),
            status,
            body: "{\"message\":\"nope\"}".to_string(),
        }
    }

    #[test]
    fn auth_failures_require_login() {
        assert!(ApiError::CredentialLost(response(StatusCode::UNAUTHORIZED)).requires_login());
        assert!(ApiError::Unauthorized(response(StatusCode::UNAUTHORIZED)).requires_login());
        assert!(!ApiError::Http(response(StatusCode::FORBIDDEN)).requires_login());
        assert!(!ApiError::Validation("x".into()).requires_login());
    }

    #[test]
    fn status_is_preserved() {
        let err = ApiError::Http(response(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(err.response().unwrap().body, "{\"message\":\"nope\"}");
        assert_eq!(ApiError::Validation("x".into()).status(), None);
    }

    #[test]
    fn display_includes_request_line() {
        let err = ApiError::CredentialLost(response(StatusCode::UNAUTHORIZED));
        assert_eq!(
            err.to_string(),
            "Session expired: GET http://localhost:5000/courses returned 401 Unauthorized"
        );
    }
}
