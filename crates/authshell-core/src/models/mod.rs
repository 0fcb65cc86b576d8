//! Data models exchanged with the auth service.
//!
//! - `User`: the identity record held by a session
//! - `Credentials`, `Registration`: sign-in and sign-up payloads
//! - `ProfileUpdate`, `PasswordChange`: authenticated write payloads

pub mod user;

pub use user::{Credentials, PasswordChange, ProfileFields, ProfileUpdate, Registration, User};
