//! Client error types

use naturein_core::CoreError;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Credential store could not be read or written
    #[error("Credential store error: {0}")]
    Credentials(#[from] CoreError),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether the caller has to log in again
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}

/// Why a credential refresh did not produce a new access credential
///
/// These never reach callers of [`crate::ApiClient::send`]; requests waiting
/// on a failed refresh get their original 401 instead.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// No refresh credential is stored
    #[error("no refresh credential stored")]
    MissingRefreshCredential,

    /// Refresh endpoint answered with a non-success status
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16 },

    /// Refresh endpoint answered with an unusable body
    #[error("malformed refresh response: {0}")]
    Malformed(String),

    /// Refresh call never got a response (includes timeouts)
    #[error("refresh request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// New credential could not be persisted
    #[error("credential store error: {0}")]
    Store(#[from] CoreError),

    /// The refresh this request was queued behind failed
    #[error("shared refresh failed")]
    SharedRefreshFailed,

    /// The refresh this request was queued behind never settled
    #[error("refresh abandoned before completion")]
    Abandoned,
}
