//! REST client module for the remote authentication service.
//!
//! This module provides the `ApiClient` for the login, register,
//! refresh-token, logout, profile and password endpoints.
//!
//! Authenticated endpoints use JWT bearer tokens issued by login/register and
//! renewed through the refresh-token endpoint.

pub mod client;
pub mod error;

pub use client::{ApiClient, TokenRefresh, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
