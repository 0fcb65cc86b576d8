use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::models::User;

/// Storage key the session record lives under
pub const SESSION_STORAGE_KEY: &str = "auth-session";

/// An authenticated identity: the user plus the token pair.
///
/// Serialized as-is, this is the durable record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

impl Session {
    pub fn new(user: User, access_token: String, refresh_token: String) -> Self {
        Self {
            user,
            access_token,
            refresh_token,
        }
    }

    /// Parse a stored record. Anything unparsable is "no session".
    pub fn from_record(record: &str) -> Option<Self> {
        let session: Session = serde_json::from_str(record).ok()?;
        if session.access_token.is_empty() || session.refresh_token.is_empty() {
            return None;
        }
        Some(session)
    }

    pub fn to_record(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Most recent user interaction.
///
/// Elapsed idle time is measured on the monotonic clock; the wall-clock
/// timestamp is only for display.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Activity {
    pub at: DateTime<Utc>,
    pub instant: Instant,
}

impl Activity {
    pub fn now() -> Self {
        Self {
            at: Utc::now(),
            instant: Instant::now(),
        }
    }

    /// Move forward to now, never backwards
    pub fn touch(&mut self) {
        let next = Self::now();
        if next.instant >= self.instant {
            self.instant = next.instant;
        }
        if next.at >= self.at {
            self.at = next.at;
        }
    }
}

/// What observers (a UI layer, the idle monitor) see of the session.
/// Tokens are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub last_activity_at: Option<DateTime<Utc>>,
}

/// Notifications broadcast by the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    TokensRefreshed,
    /// Forced logout after the idle threshold passed
    IdleExpired,
    /// Forced logout after the refresh token was rejected
    SessionInvalidated,
}

impl SessionEvent {
    /// Notice to show the user, if the event warrants one
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            SessionEvent::SignedIn => Some("Login successful"),
            SessionEvent::SignedOut => Some("Logged out successfully"),
            SessionEvent::TokensRefreshed => None,
            SessionEvent::IdleExpired => Some("Your session has expired due to inactivity."),
            SessionEvent::SessionInvalidated => {
                Some("Your session has expired. Please sign in again.")
            }
        }
    }
}
