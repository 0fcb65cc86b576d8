//! Transparent access-token refresh for authenticated calls.
//!
//! A request that comes back with an expiry signal triggers one
//! refresh-token exchange and is then retried exactly once. A second expiry
//! signal on the retry ends the session instead of refreshing again.

use std::future::Future;

use tracing::{debug, warn};

use crate::api::{ApiError, TokenRefresh};

use super::error::AuthError;
use super::session::SessionEvent;
use super::store::SessionStore;

/// Marks whether a request has already been retried after a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retried,
}

/// Does this refresh failure mean the refresh token itself is no good?
///
/// Transport trouble and server errors leave the session alone.
fn rejects_refresh_token(err: &ApiError) -> bool {
    matches!(
        err,
        ApiError::TokenExpired | ApiError::Unauthorized(_) | ApiError::Rejected { .. }
    )
}

impl SessionStore {
    /// Run `call` with the current access token, refreshing and retrying
    /// once if the server reports the token as expired.
    pub(crate) async fn authorized<T, F, Fut>(&self, mut call: F) -> Result<T, AuthError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = Attempt::First;
        loop {
            let token = self.access_token().ok_or(AuthError::NotAuthenticated)?;

            match call(token.clone()).await {
                Err(e) if e.is_token_expired() && attempt == Attempt::First => {
                    debug!("Access token expired, attempting refresh");
                    self.refresh_expired(&token).await?;
                    attempt = Attempt::Retried;
                }
                Err(e) if e.is_token_expired() => {
                    warn!("Retried request reported an expired token again, ending session");
                    self.end_session(SessionEvent::SessionInvalidated).await;
                    return Err(AuthError::SessionExpired);
                }
                result => return result.map_err(AuthError::from),
            }
        }
    }

    /// Replace `stale` with a fresh token pair.
    ///
    /// Refreshes are serialized; a caller that finds the token already
    /// replaced by a concurrent refresh returns without a second exchange.
    async fn refresh_expired(&self, stale: &str) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;

        let (refresh_token, epoch) = {
            let state = self.state();
            let Some(session) = state.session.as_ref() else {
                return Err(AuthError::SessionExpired);
            };
            if session.access_token != stale {
                debug!("Token already refreshed by a concurrent request");
                return Ok(());
            }
            (session.refresh_token.clone(), state.epoch)
        };

        match self.api.refresh(&refresh_token).await {
            Ok(refresh) => self.apply_refresh(refresh, epoch),
            Err(e) if rejects_refresh_token(&e) => {
                warn!(error = %e, "Refresh token rejected, ending session");
                self.end_session(SessionEvent::SessionInvalidated).await;
                Err(AuthError::SessionExpired)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                Err(AuthError::from(e))
            }
        }
    }

    fn apply_refresh(&self, refresh: TokenRefresh, epoch: u64) -> Result<(), AuthError> {
        let mut state = self.state();
        if state.epoch != epoch {
            debug!("Discarding refresh result that arrived after the session ended");
            return Err(AuthError::SessionExpired);
        }
        let Some(session) = state.session.as_mut() else {
            return Err(AuthError::SessionExpired);
        };

        session.access_token = refresh.access_token;
        session.refresh_token = refresh.refresh_token;
        if let Some(fields) = refresh.user.as_ref() {
            if let Err(e) = session.user.merge(fields) {
                warn!(error = %e, "Ignoring malformed user data in refresh response");
            }
        }

        debug!("Access token refreshed");
        self.persist_and_publish(state);
        self.emit(SessionEvent::TokensRefreshed);
        Ok(())
    }
}
