//! Idle timeout monitor.
//!
//! A background task that polls the session's idle time while someone is
//! signed in and forces a logout once the idle threshold is passed. The
//! polling timer only exists while authenticated; it is dropped the moment
//! the session ends, whatever ended it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::session::SessionEvent;
use super::store::SessionStore;

/// Forced logout after this much inactivity
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How often idle time is checked
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_IDLE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl IdlePolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            // a zero period would make the interval panic
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn is_expired(&self, idle: Duration) -> bool {
        idle > self.timeout
    }
}

/// Handle to a running monitor. Dropping it stops the monitor.
pub struct IdleMonitor {
    handle: JoinHandle<()>,
}

impl IdleMonitor {
    /// Start watching `store`. Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<SessionStore>, policy: IdlePolicy) -> Self {
        let handle = tokio::spawn(run(store, policy));
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        // Drop aborts the task
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(store: Arc<SessionStore>, policy: IdlePolicy) {
    let mut updates = store.subscribe();

    loop {
        // Wait for someone to sign in
        loop {
            let authenticated = updates.borrow_and_update().is_authenticated;
            if authenticated {
                break;
            }
            if updates.changed().await.is_err() {
                return;
            }
        }

        debug!(
            timeout_secs = policy.timeout.as_secs(),
            poll_secs = policy.poll_interval.as_secs(),
            "Idle monitor armed"
        );
        let mut ticker = interval_at(Instant::now() + policy.poll_interval, policy.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(idle) = store.idle_duration() else {
                        break;
                    };
                    if policy.is_expired(idle) {
                        info!(idle_secs = idle.as_secs(), "Session idle too long, logging out");
                        store.end_session(SessionEvent::IdleExpired).await;
                        break;
                    }
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let authenticated = updates.borrow_and_update().is_authenticated;
                    if !authenticated {
                        break;
                    }
                }
            }
        }
        debug!("Idle monitor disarmed");
    }
}
