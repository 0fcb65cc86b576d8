//! Client-side session manager for a remote authentication API.
//!
//! The [`auth::SessionStore`] owns the signed-in user's credentials, refreshes
//! expired access tokens behind every authenticated call and persists the
//! session across restarts. [`auth::IdleMonitor`] logs the user out after a
//! period of inactivity.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthError, IdleMonitor, IdlePolicy, Session, SessionEvent, SessionSnapshot, SessionStore,
};
pub use config::Config;
pub use models::{Credentials, PasswordChange, ProfileUpdate, Registration, User};
