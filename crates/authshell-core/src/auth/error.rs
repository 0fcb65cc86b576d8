use thiserror::Error;

use crate::api::ApiError;

/// Message used when the server gives no reason for a failure
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong";

/// Errors surfaced by [`SessionStore`](super::SessionStore) operations.
///
/// Every variant renders as a message fit to show the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Bad credentials or input, rejected by the server. Session untouched.
    #[error("{0}")]
    Credential(String),

    /// The refresh token was rejected or the retried request expired again.
    /// The session has been cleared.
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    /// An authenticated operation was attempted without a session.
    #[error("You are not signed in")]
    NotAuthenticated,

    /// The server could not be reached or answered with a server error.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with something we could not understand.
    #[error("Unexpected response from server: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// Whether the caller has to sign in again after this error
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, AuthError::SessionExpired | AuthError::NotAuthenticated)
    }
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::TokenExpired => AuthError::SessionExpired,
            ApiError::Unauthorized(message) | ApiError::Rejected { message, .. } => {
                if message.trim().is_empty() {
                    AuthError::Credential(GENERIC_FAILURE_MESSAGE.to_string())
                } else {
                    AuthError::Credential(message)
                }
            }
            ApiError::RateLimited => {
                AuthError::Credential("Too many attempts. Please wait and try again.".to_string())
            }
            ApiError::ServerError(message) => AuthError::Network(message),
            ApiError::NetworkError(e) => AuthError::Network(e.to_string()),
            ApiError::InvalidResponse(message) => AuthError::InvalidResponse(message),
        }
    }
}
