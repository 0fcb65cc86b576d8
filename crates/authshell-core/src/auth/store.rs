//! The session store: sole owner of the authenticated session.
//!
//! Every mutation follows the same order: update the in-memory state, write
//! the durable copy, then publish to observers. Observers read through
//! [`SessionStore::subscribe`] (latest snapshot) and [`SessionStore::events`]
//! (one-off notifications); nothing outside this module writes session state.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{Credentials, PasswordChange, ProfileUpdate, Registration, User};

use super::error::AuthError;
use super::session::{Activity, Session, SessionEvent, SessionSnapshot};
use super::storage::SessionStorage;

/// Buffered notifications per subscriber before the slowest one lags
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub session: Option<Session>,
    pub activity: Option<Activity>,
    pub loading: bool,
    pub error: Option<String>,
    /// Bumped whenever a session begins or ends. Responses that started in an
    /// older epoch must not touch the current session.
    pub epoch: u64,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.session.as_ref().map(|s| s.user.clone()),
            is_authenticated: self.session.is_some(),
            loading: self.loading,
            error: self.error.clone(),
            last_activity_at: self.activity.map(|a| a.at),
        }
    }
}

pub struct SessionStore {
    pub(crate) api: ApiClient,
    storage: Box<dyn SessionStorage>,
    state: Mutex<SessionState>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
    pub(crate) refresh_lock: tokio::sync::Mutex<()>,
}

impl SessionStore {
    /// Create the store and rehydrate any session left in `storage`.
    pub fn new(api: ApiClient, storage: impl SessionStorage + 'static) -> Self {
        let storage: Box<dyn SessionStorage> = Box::new(storage);
        let session = Self::rehydrate(storage.as_ref());

        let state = SessionState {
            activity: session.as_ref().map(|_| Activity::now()),
            session,
            ..Default::default()
        };
        let (snapshot_tx, _) = watch::channel(state.snapshot());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            api,
            storage,
            state: Mutex::new(state),
            snapshot_tx,
            events_tx,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn rehydrate(storage: &dyn SessionStorage) -> Option<Session> {
        let record = match storage.load() {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No stored session");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load stored session");
                return None;
            }
        };

        match Session::from_record(&record) {
            Some(session) => {
                info!(user = %session.user.display_name(), "Restored session from storage");
                Some(session)
            }
            None => {
                warn!("Stored session is unreadable, discarding it");
                if let Err(e) = storage.clear() {
                    warn!(error = %e, "Failed to remove unreadable session record");
                }
                None
            }
        }
    }

    // ===== State plumbing =====

    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish the current state to observers, releasing the lock first
    pub(crate) fn publish(&self, state: MutexGuard<'_, SessionState>) {
        let snapshot = state.snapshot();
        drop(state);
        self.snapshot_tx.send_replace(snapshot);
    }

    /// Write the durable copy, then publish
    pub(crate) fn persist_and_publish(&self, state: MutexGuard<'_, SessionState>) {
        let result = match state.session.as_ref() {
            Some(session) => session
                .to_record()
                .map_err(anyhow::Error::from)
                .and_then(|record| self.storage.save(&record)),
            None => self.storage.clear(),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session");
        }
        self.publish(state);
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.state().session.as_ref().map(|s| s.access_token.clone())
    }

    // ===== Reads =====

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot()
    }

    /// Follow session changes. The receiver always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().session.is_some()
    }

    pub fn user(&self) -> Option<User> {
        self.state().session.as_ref().map(|s| s.user.clone())
    }

    pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        self.state().activity.map(|a| a.at)
    }

    /// Time since the last recognized activity, `None` while signed out
    pub fn idle_duration(&self) -> Option<Duration> {
        self.state().activity.map(|a| a.instant.elapsed())
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // ===== Activity =====

    /// Activity signal from the user. Ignored while signed out.
    pub fn record_activity(&self) {
        let mut state = self.state();
        if state.session.is_none() {
            return;
        }
        match state.activity.as_mut() {
            Some(activity) => activity.touch(),
            None => state.activity = Some(Activity::now()),
        }
        self.publish(state);
    }

    // ===== Credential exchanges =====

    /// Sign in with email and password
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.begin_exchange();
        let result = self.api.login(credentials).await;
        self.finish_exchange(result)
    }

    /// Create an account. Success signs the new user in immediately.
    pub async fn register(&self, registration: &Registration) -> Result<Session, AuthError> {
        self.begin_exchange();
        let result = self.api.register(registration).await;
        self.finish_exchange(result)
    }

    fn begin_exchange(&self) {
        let mut state = self.state();
        state.loading = true;
        state.error = None;
        self.publish(state);
    }

    fn finish_exchange(&self, result: Result<Session, ApiError>) -> Result<Session, AuthError> {
        match result {
            Ok(session) => {
                let mut state = self.state();
                state.session = Some(session.clone());
                state.activity = Some(Activity::now());
                state.epoch += 1;
                state.loading = false;
                state.error = None;
                info!(user = %session.user.display_name(), "Signed in");
                self.persist_and_publish(state);
                self.emit(SessionEvent::SignedIn);
                Ok(session)
            }
            Err(e) => {
                let err = AuthError::from(e);
                debug!(error = %err, "Credential exchange failed");
                let mut state = self.state();
                state.loading = false;
                state.error = Some(err.to_string());
                self.publish(state);
                Err(err)
            }
        }
    }

    // ===== Teardown =====

    /// Sign out. Safe to call when already signed out.
    pub async fn logout(&self) {
        self.end_session(SessionEvent::SignedOut).await;
    }

    /// Clear the session locally, then tell the server. Returns whether there
    /// was a session to end; only then is `reason` broadcast.
    pub(crate) async fn end_session(&self, reason: SessionEvent) -> bool {
        let ended = {
            let mut state = self.state();
            let Some(session) = state.session.take() else {
                return false;
            };
            state.activity = None;
            state.epoch += 1;
            state.loading = false;
            state.error = match reason {
                SessionEvent::SignedOut => None,
                other => other.notice().map(str::to_string),
            };
            self.persist_and_publish(state);
            session
        };

        info!(reason = ?reason, "Session ended");
        self.emit(reason);

        if let Err(e) = self
            .api
            .logout(&ended.access_token, &ended.refresh_token)
            .await
        {
            debug!(error = %e, "Remote logout failed, local session already cleared");
        }
        true
    }

    // ===== Authenticated calls =====

    /// Fetch the canonical profile. Does not modify the session.
    pub async fn get_profile(&self) -> Result<User, AuthError> {
        let api = &self.api;
        self.authorized(|token| api.me(token)).await
    }

    /// Save profile edits and merge what the server returns into the
    /// session's user, field by field.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, AuthError> {
        let epoch = self.state().epoch;
        let api = &self.api;
        let fields = self
            .authorized(|token| api.update_profile(token, update))
            .await?;

        let mut state = self.state();
        if state.epoch != epoch {
            debug!("Discarding profile update that finished after the session ended");
            return Err(AuthError::NotAuthenticated);
        }
        let Some(session) = state.session.as_mut() else {
            return Err(AuthError::NotAuthenticated);
        };
        let mut user = session.user.clone();
        user.merge(&fields)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        session.user = user.clone();
        self.persist_and_publish(state);
        Ok(user)
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), AuthError> {
        let api = &self.api;
        self.authorized(|token| api.change_password(token, change))
            .await
    }
}
