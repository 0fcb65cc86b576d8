//! Authentication module: the client-side session manager.
//!
//! This module provides:
//! - `SessionStore`: the single owner of the signed-in session, with
//!   transparent access-token refresh on every authenticated call
//! - `IdleMonitor`: forced logout after a period without user activity
//! - `SessionStorage` backends: file, OS keychain, memory
//!
//! Sessions are persisted so a restart resumes without signing in again.

pub mod credentials;
pub mod error;
pub mod idle;
mod interceptor;
pub mod session;
pub mod storage;
pub mod store;

pub use credentials::KeyringStorage;
pub use error::AuthError;
pub use idle::{IdleMonitor, IdlePolicy};
pub use session::{Session, SessionEvent, SessionSnapshot, SESSION_STORAGE_KEY};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use store::SessionStore;
