use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access token expired")]
    TokenExpired,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error payload returned by the auth service on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    token_expired: bool,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Classify a non-success response.
    ///
    /// Only a 401 that carries `tokenExpired: true` becomes [`ApiError::TokenExpired`];
    /// every other authorization failure stays a plain error so it never
    /// triggers a token refresh.
    ///
    /// Rejections only ever carry the server's own `message`. Anything else
    /// in the body (HTML error pages, foreign JSON) is left to the logs and
    /// the rejection gets an empty message instead.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let server_message = parsed.message.filter(|m| !m.trim().is_empty());
        if server_message.is_none() && !body.trim().is_empty() {
            debug!(
                status = status.as_u16(),
                body = %Self::truncate_body(body),
                "Error response without a message"
            );
        }

        match status.as_u16() {
            401 if parsed.token_expired => ApiError::TokenExpired,
            401 => ApiError::Unauthorized(server_message.unwrap_or_default()),
            429 => ApiError::RateLimited,
            code @ 400..=499 => ApiError::Rejected {
                status: code,
                message: server_message.unwrap_or_default(),
            },
            500..=599 => ApiError::ServerError(
                server_message.unwrap_or_else(|| Self::truncate_body(body)),
            ),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                server_message.unwrap_or_else(|| Self::truncate_body(body))
            )),
        }
    }

    pub fn is_token_expired(&self) -> bool {
        matches!(self, ApiError::TokenExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_expired_marker_requires_401() {
        let body = r#"{"message":"jwt expired","tokenExpired":true}"#;
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, body).is_token_expired());
        assert!(!ApiError::from_status(StatusCode::FORBIDDEN, body).is_token_expired());
    }

    #[test]
    fn test_plain_401_is_not_expiry() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"message":"Not authorized"}"#);
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Not authorized"));

        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Not authorized","tokenExpired":false}"#,
        );
        assert!(!err.is_token_expired());
    }

    #[test]
    fn test_rejection_carries_server_message() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"message":"Invalid credentials"}"#);
        assert!(matches!(err, ApiError::Rejected { status: 400, ref message } if message == "Invalid credentials"));
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_rejection_without_message_field_has_empty_message() {
        for body in [r#"{"error":"bad"}"#, "<html>Bad Request</html>", ""] {
            let err = ApiError::from_status(StatusCode::BAD_REQUEST, body);
            assert!(
                matches!(err, ApiError::Rejected { ref message, .. } if message.is_empty()),
                "body {body:?} gave {err:?}"
            );
        }
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "<html>401</html>");
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m.is_empty()));
    }

    #[test]
    fn test_non_json_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        match err {
            ApiError::ServerError(msg) => {
                assert!(msg.contains("truncated"));
                assert!(msg.len() < body.len() + 40);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rate_limit() {
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
    }
}
