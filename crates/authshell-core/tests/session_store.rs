//! Session store operations against a mock auth service

mod common;

use std::sync::Arc;
use std::time::Duration;

use authshell_core::auth::{AuthError, MemoryStorage, SessionEvent, SessionStore};
use authshell_core::ApiClient;
use authshell_core::models::{Credentials, PasswordChange, ProfileUpdate, Registration};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

fn credentials() -> Credentials {
    Credentials {
        email: "a@b.com".to_string(),
        password: "x".to_string(),
    }
}

#[tokio::test]
async fn test_login_then_logout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "a@b.com", "password": "x"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("a1", "r1")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer a1"))
        .and(body_json(json!({"refreshToken": "r1"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (store, storage) = signed_out_store(&server);
    let mut events = store.events();

    let session = store.login(&credentials()).await.expect("login");
    assert!(store.is_authenticated());
    assert!(store.last_activity_at().is_some());
    assert_eq!(session.user.username, "ada");

    // Durable copy mirrors memory exactly
    assert_eq!(stored_session(&storage), Some(session.clone()));
    assert_eq!(store.user(), Some(session.user));
    assert!(matches!(events.try_recv(), Ok(SessionEvent::SignedIn)));

    store.logout().await;

    let snapshot = store.snapshot();
    assert!(!snapshot.is_authenticated);
    assert!(snapshot.user.is_none());
    assert!(snapshot.last_activity_at.is_none());
    assert_eq!(stored_session(&storage), None);
    assert!(matches!(events.try_recv(), Ok(SessionEvent::SignedOut)));
}

#[tokio::test]
async fn test_register_signs_in_immediately() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(json!({
            "username": "ada",
            "email": "ada@example.com",
            "password": "secret1"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(auth_body("a1", "r1")))
        .expect(1)
        .mount(&server)
        .await;

    let (store, storage) = signed_out_store(&server);
    let registration = Registration {
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        password: "secret1".to_string(),
    };

    let mut events = store.events();

    let session = store.register(&registration).await.expect("register");
    assert!(store.is_authenticated());
    assert_eq!(stored_session(&storage), Some(session));

    // One sign-in notice, nothing else
    assert_eq!(
        events.try_recv().ok().and_then(|e| e.notice()),
        Some("Login successful")
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_login_keeps_prior_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .mount(&server)
        .await;

    let (store, storage) = signed_in_store(&server);
    let before = stored_session(&storage);

    let err = store.login(&credentials()).await.unwrap_err();
    assert_eq!(err, AuthError::Credential("Invalid credentials".to_string()));

    let snapshot = store.snapshot();
    assert!(snapshot.is_authenticated);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.error.as_deref(), Some("Invalid credentials"));
    assert_eq!(stored_session(&storage), before);
}

#[tokio::test]
async fn test_failed_login_without_message_is_generic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let (store, _storage) = signed_out_store(&server);
    let err = store.login(&credentials()).await.unwrap_err();
    assert_eq!(err.to_string(), "Something went wrong");
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn test_login_rejection_without_message_field_is_generic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad"})))
        .mount(&server)
        .await;

    let (store, _storage) = signed_out_store(&server);
    let err = store.login(&credentials()).await.unwrap_err();
    assert_eq!(err, AuthError::Credential("Something went wrong".to_string()));
    assert_eq!(store.snapshot().error.as_deref(), Some("Something went wrong"));
}

#[tokio::test]
async fn test_register_rejection_with_html_body_is_generic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_raw("<html>Bad Request</html>", "text/html"),
        )
        .mount(&server)
        .await;

    let (store, _storage) = signed_out_store(&server);
    let registration = Registration {
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        password: "secret1".to_string(),
    };
    let err = store.register(&registration).await.unwrap_err();
    assert_eq!(err.to_string(), "Something went wrong");
    assert_eq!(store.snapshot().error.as_deref(), Some("Something went wrong"));
}

#[tokio::test]
async fn test_login_accepts_non_string_optional_user_fields() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": 42, "username": "ada", "email": "ada@example.com", "role": 2},
            "accessToken": "a1",
            "refreshToken": "r1"
        })))
        .mount(&server)
        .await;

    let (store, storage) = signed_out_store(&server);
    let session = store.login(&credentials()).await.expect("login");
    assert_eq!(session.user.id, Some(json!(42)));
    assert_eq!(session.user.role, Some(json!(2)));
    assert_eq!(stored_session(&storage), Some(session));
}

#[tokio::test]
async fn test_network_failure_leaves_session_untouched() {
    // Nothing listens on the discard port
    let api = ApiClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).expect("client");
    let storage = Arc::new(MemoryStorage::with_record(stored_record("a1", "r1")));
    let store = SessionStore::new(api, storage.clone());
    let before = stored_session(&storage);

    let err = store.login(&credentials()).await.unwrap_err();
    assert!(matches!(err, AuthError::Network(_)));
    assert!(store.is_authenticated());
    assert_eq!(stored_session(&storage), before);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (store, storage) = signed_in_store(&server);
    let mut events = store.events();

    store.logout().await;
    let after_first = store.snapshot();
    store.logout().await;

    assert_eq!(store.snapshot(), after_first);
    assert_eq!(stored_session(&storage), None);
    assert!(matches!(events.try_recv(), Ok(SessionEvent::SignedOut)));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_remote_logout_failure_does_not_block_local_logout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (store, storage) = signed_in_store(&server);
    store.logout().await;

    assert!(!store.is_authenticated());
    assert_eq!(stored_session(&storage), None);
}

#[tokio::test]
async fn test_get_profile_does_not_touch_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("someone-else")))
        .expect(1)
        .mount(&server)
        .await;

    let (store, storage) = signed_in_store(&server);
    let before = stored_session(&storage);

    let profile = store.get_profile().await.expect("profile");
    assert_eq!(profile.username, "someone-else");
    assert_eq!(store.user().map(|u| u.username), Some("ada".to_string()));
    assert_eq!(stored_session(&storage), before);
}

#[tokio::test]
async fn test_update_profile_merges_fields() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/auth/profile"))
        .and(header("authorization", "Bearer a1"))
        .and(body_json(json!({"username": "ada.l"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"username": "ada.l", "bio": "analyst"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (store, storage) = signed_in_store(&server);
    let update = ProfileUpdate {
        username: Some("ada.l".to_string()),
        ..Default::default()
    };

    let user = store.update_profile(&update).await.expect("update");
    assert_eq!(user.username, "ada.l");
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.extra.get("theme"), Some(&json!("dark")));
    assert_eq!(user.extra.get("bio"), Some(&json!("analyst")));

    let stored = stored_session(&storage).expect("stored session");
    assert_eq!(stored.user, user);
    // Tokens are not part of the merge
    assert_eq!(stored.access_token, "a1");
    assert_eq!(stored.refresh_token, "r1");
}

#[tokio::test]
async fn test_update_profile_rejection_keeps_user() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/auth/profile"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "Email already in use"})),
        )
        .mount(&server)
        .await;

    let (store, storage) = signed_in_store(&server);
    let before = stored_session(&storage);
    let update = ProfileUpdate {
        email: Some("taken@example.com".to_string()),
        ..Default::default()
    };

    let err = store.update_profile(&update).await.unwrap_err();
    assert_eq!(err.to_string(), "Email already in use");
    assert_eq!(stored_session(&storage), before);
}

#[tokio::test]
async fn test_change_password() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/auth/password"))
        .and(header("authorization", "Bearer a1"))
        .and(body_json(json!({"currentPassword": "old-pass", "newPassword": "new-pass"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Password updated"})))
        .expect(1)
        .mount(&server)
        .await;

    let (store, storage) = signed_in_store(&server);
    let before = stored_session(&storage);

    store
        .change_password(&PasswordChange {
            current_password: "old-pass".to_string(),
            new_password: "new-pass".to_string(),
        })
        .await
        .expect("password change");

    assert!(store.is_authenticated());
    assert_eq!(stored_session(&storage), before);
}

#[tokio::test]
async fn test_change_password_wrong_current() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/auth/password"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"message": "Current password is incorrect"})),
        )
        .mount(&server)
        .await;

    let (store, _storage) = signed_in_store(&server);
    let err = store
        .change_password(&PasswordChange {
            current_password: "wrong".to_string(),
            new_password: "new-pass".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(err, AuthError::Credential("Current password is incorrect".to_string()));
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn test_subscribers_see_sign_in() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("a1", "r1")))
        .mount(&server)
        .await;

    let (store, _storage) = signed_out_store(&server);
    let mut updates = store.subscribe();
    assert!(!updates.borrow_and_update().is_authenticated);

    store.login(&credentials()).await.expect("login");

    assert!(updates.has_changed().expect("sender alive"));
    let snapshot = updates.borrow_and_update().clone();
    assert!(snapshot.is_authenticated);
    assert!(!snapshot.loading);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.user.map(|u| u.username), Some("ada".to_string()));
}
