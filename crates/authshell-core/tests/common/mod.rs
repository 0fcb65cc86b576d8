// Not every test binary uses every helper
#![allow(dead_code)]

use std::sync::Arc;

use authshell_core::auth::{MemoryStorage, Session, SessionStorage, SessionStore};
use authshell_core::ApiClient;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn user_json(username: &str) -> Value {
    json!({
        "id": "65f1c0ffee",
        "username": username,
        "email": format!("{username}@example.com"),
        "role": "user",
        "theme": "dark"
    })
}

pub fn auth_body(access: &str, refresh: &str) -> Value {
    json!({
        "user": user_json("ada"),
        "accessToken": access,
        "refreshToken": refresh
    })
}

pub fn token_body(access: &str, refresh: &str) -> Value {
    json!({ "accessToken": access, "refreshToken": refresh })
}

pub fn expired_body() -> Value {
    json!({ "message": "Token expired", "tokenExpired": true })
}

pub fn stored_record(access: &str, refresh: &str) -> String {
    auth_body(access, refresh).to_string()
}

pub fn stored_session(storage: &MemoryStorage) -> Option<Session> {
    storage
        .load()
        .expect("memory storage never fails")
        .and_then(|record| Session::from_record(&record))
}

/// A store that starts out signed in as "ada" with tokens a1/r1
pub fn signed_in_store(server: &MockServer) -> (Arc<SessionStore>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::with_record(stored_record("a1", "r1")));
    let api = ApiClient::new(server.uri()).expect("client");
    let store = Arc::new(SessionStore::new(api, storage.clone()));
    assert!(store.is_authenticated());
    (store, storage)
}

pub fn signed_out_store(server: &MockServer) -> (Arc<SessionStore>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let api = ApiClient::new(server.uri()).expect("client");
    let store = Arc::new(SessionStore::new(api, storage.clone()));
    (store, storage)
}

pub async fn mount_logout(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Logged out"})))
        .mount(server)
        .await;
}
