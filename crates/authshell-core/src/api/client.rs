//! HTTP client for the remote authentication service.
//!
//! One method per endpoint. Authenticated methods take the bearer token as
//! an argument; deciding which token to send and what to do when it has
//! expired is the session store's job, not the client's.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::auth::Session;
use crate::models::{Credentials, PasswordChange, ProfileFields, ProfileUpdate, Registration, User};

use super::ApiError;

/// Default base URL of the auth service
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Successful login or registration
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    user: User,
    access_token: String,
    refresh_token: String,
}

/// Result of a refresh-token exchange
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefresh {
    pub access_token: String,
    pub refresh_token: String,
    /// Some servers hand back fresh user data along with the tokens
    #[serde(default)]
    pub user: Option<ProfileFields>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenBody<'a> {
    refresh_token: &'a str,
}

/// API client for the auth service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning a classified error if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        Self::check_response(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    // ===== Unauthenticated =====

    /// POST /auth/login
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        debug!("Sending login request");
        let auth: AuthResponse = self
            .send_json(self.client.post(self.url("/auth/login")).json(credentials))
            .await?;
        Ok(Session::new(auth.user, auth.access_token, auth.refresh_token))
    }

    /// POST /auth/register
    pub async fn register(&self, registration: &Registration) -> Result<Session, ApiError> {
        debug!("Sending registration request");
        let auth: AuthResponse = self
            .send_json(self.client.post(self.url("/auth/register")).json(registration))
            .await?;
        Ok(Session::new(auth.user, auth.access_token, auth.refresh_token))
    }

    /// POST /auth/refresh-token. The refresh token travels in the body; no
    /// bearer header is sent.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRefresh, ApiError> {
        debug!("Exchanging refresh token");
        self.send_json(
            self.client
                .post(self.url("/auth/refresh-token"))
                .json(&RefreshTokenBody { refresh_token }),
        )
        .await
    }

    // ===== Authenticated =====

    /// POST /auth/logout
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), ApiError> {
        self.send(
            self.client
                .post(self.url("/auth/logout"))
                .bearer_auth(access_token)
                .json(&RefreshTokenBody { refresh_token }),
        )
        .await?;
        Ok(())
    }

    /// GET /auth/me
    pub async fn me(&self, access_token: String) -> Result<User, ApiError> {
        self.send_json(self.client.get(self.url("/auth/me")).bearer_auth(access_token))
            .await
    }

    /// PUT /auth/profile
    pub async fn update_profile(
        &self,
        access_token: String,
        update: &ProfileUpdate,
    ) -> Result<ProfileFields, ApiError> {
        self.send_json(
            self.client
                .put(self.url("/auth/profile"))
                .bearer_auth(access_token)
                .json(update),
        )
        .await
    }

    /// PUT /auth/password
    pub async fn change_password(
        &self,
        access_token: String,
        change: &PasswordChange,
    ) -> Result<(), ApiError> {
        self.send(
            self.client
                .put(self.url("/auth/password"))
                .bearer_auth(access_token)
                .json(change),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:5000/api/").expect("client");
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.url("/auth/me"), "http://localhost:5000/api/auth/me");
    }

    #[test]
    fn test_parse_auth_response() {
        let json = r#"{
            "user": {"id": "65f1", "username": "ada", "email": "ada@example.com", "role": "admin"},
            "accessToken": "access-1",
            "refreshToken": "refresh-1"
        }"#;
        let auth: AuthResponse = serde_json::from_str(json).expect("auth response");
        assert_eq!(auth.user.username, "ada");
        assert_eq!(auth.user.role, Some(serde_json::json!("admin")));
        assert_eq!(auth.access_token, "access-1");
        assert_eq!(auth.refresh_token, "refresh-1");
    }

    #[test]
    fn test_parse_refresh_without_user() {
        let json = r#"{"accessToken": "a2", "refreshToken": "r2"}"#;
        let refresh: TokenRefresh = serde_json::from_str(json).expect("refresh response");
        assert_eq!(refresh.access_token, "a2");
        assert!(refresh.user.is_none());
    }
}
