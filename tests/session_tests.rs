//! Credential exchange and session store tests against the mock backend
//!
//! Run with: cargo test --test session_tests

mod common;

use common::{BackendState, MockBackend, EMAIL, PASSWORD, RESET_TOKEN};
use portal_session::auth::storage::{load_tokens, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use portal_session::auth::{FileTokenStore, RegistrationForm, TokenStore};
use portal_session::{BootstrapOutcome, ErrorKind, SessionEvent};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_populates_session_and_storage() {
    let backend = MockBackend::start().await;
    let (session, store) = backend.manager();
    let mut events = session.events();

    let user = session.login(EMAIL, PASSWORD).await.expect("login");

    assert_eq!(user.id, "u-1");
    assert_eq!(user.username, "alice");
    assert_eq!(session.current_user(), Some(user.clone()));

    let snapshot = session.snapshot();
    assert!(snapshot.is_authenticated());
    assert!(!snapshot.is_loading());
    assert!(snapshot.last_error().is_none());
    assert!(snapshot.access_token_expires_at().is_some());

    let tokens = load_tokens(store.as_ref()).unwrap().expect("tokens persisted");
    assert!(backend.state.accepts_access(&tokens.access_token));

    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Authenticated { user }
    );
}

#[tokio::test]
async fn test_login_failure_preserves_session() {
    let backend = MockBackend::start().await;
    let (session, store) = backend.manager();

    let err = session.login(EMAIL, "wrong").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(err.to_string(), "Invalid email or password");

    let snapshot = session.snapshot();
    assert!(snapshot.user().is_none());
    assert_eq!(snapshot.last_error(), Some("Invalid email or password"));
    assert!(!snapshot.is_loading());
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_login_validation_happens_before_network() {
    let backend = MockBackend::start().await;
    let (session, _) = backend.manager();

    let err = session.login("not-an-email", PASSWORD).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert_eq!(backend.requests(), 0);
    assert!(session.snapshot().last_error().is_some());
}

#[tokio::test]
async fn test_successful_login_clears_previous_error() {
    let backend = MockBackend::start().await;
    let (session, _) = backend.manager();

    let _ = session.login(EMAIL, "wrong").await;
    assert!(session.snapshot().last_error().is_some());

    session.login(EMAIL, PASSWORD).await.unwrap();
    assert!(session.snapshot().last_error().is_none());
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_is_idempotent() {
    let backend = MockBackend::start().await;
    let (session, store) = backend.manager();
    session.login(EMAIL, PASSWORD).await.unwrap();

    let mut events = session.events();

    session.logout().unwrap();
    let after_first = session.snapshot();
    session.logout().unwrap();
    let after_second = session.snapshot();

    assert!(after_first.user().is_none());
    assert!(after_second.user().is_none());
    assert_eq!(after_first.is_loading(), after_second.is_loading());
    assert_eq!(load_tokens(store.as_ref()).unwrap(), None);

    // Exactly one navigation-worthy event.
    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_requests_after_logout_carry_no_bearer() {
    let backend = MockBackend::start().await;
    let (session, _) = backend.manager();
    session.login(EMAIL, PASSWORD).await.unwrap();
    session.logout().unwrap();

    let err = session
        .api()
        .get_json::<serde_json::Value>("/api/tickets")
        .await
        .unwrap_err();

    // No refresh token left, so the interceptor gives up immediately.
    assert_eq!(err.kind(), ErrorKind::RefreshExhausted);
    assert_eq!(BackendState::count(&backend.state.refresh_calls), 0);
}

// ============================================================================
// Registration and password reset
// ============================================================================

#[tokio::test]
async fn test_register_logs_in() {
    let backend = MockBackend::start().await;
    let (session, store) = backend.manager();
    let mut events = session.events();

    let mut form = RegistrationForm::new("bob", "bob@example.com", "hunter22");
    form.first_name = Some("Bob".to_string());

    let user = session.register(&form).await.expect("register");

    assert_eq!(user.username, "bob");
    assert_eq!(user.extra.get("firstName"), Some(&serde_json::json!("Bob")));
    assert!(session.is_authenticated());
    assert!(load_tokens(store.as_ref()).unwrap().is_some());
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Authenticated { .. }
    ));
}

#[tokio::test]
async fn test_register_conflict_is_validation_failure() {
    let backend = MockBackend::start().await;
    let (session, _) = backend.manager();

    let form = RegistrationForm::new("dup", "taken@example.com", "hunter22");
    let err = session.register(&form).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert_eq!(session.snapshot().last_error(), Some("Email already registered"));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_forgot_password_never_touches_user() {
    let backend = MockBackend::start().await;
    let (session, _) = backend.manager();
    session.login(EMAIL, PASSWORD).await.unwrap();

    let message = session.forgot_password(EMAIL).await.unwrap();

    assert_eq!(message, "Reset instructions sent");
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_reset_password_does_not_log_in() {
    let backend = MockBackend::start().await;
    let (session, store) = backend.manager();
    let mut events = session.events();

    let message = session
        .reset_password(RESET_TOKEN, "new-password")
        .await
        .unwrap();

    assert_eq!(message, "Password updated");
    assert!(!session.is_authenticated());
    assert_eq!(load_tokens(store.as_ref()).unwrap(), None);
    assert_eq!(events.recv().await.unwrap(), SessionEvent::PasswordReset);
}

#[tokio::test]
async fn test_reset_password_refused_in_envelope() {
    let backend = MockBackend::start().await;
    let (session, _) = backend.manager();

    let err = session
        .reset_password("stale-token", "new-password")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidToken);
    assert_eq!(
        session.snapshot().last_error(),
        Some("Reset link is invalid or expired")
    );
}

// ============================================================================
// Observers and persistence
// ============================================================================

#[tokio::test]
async fn test_observer_sees_login() {
    let backend = MockBackend::start().await;
    let (session, _) = backend.manager();
    session.bootstrap().await;

    let mut rx = session.subscribe();
    let _ = rx.borrow_and_update();

    let watcher = tokio::spawn(async move {
        loop {
            rx.changed().await.unwrap();
            if rx.borrow_and_update().user().is_some() {
                return true;
            }
        }
    });

    session.login(EMAIL, PASSWORD).await.unwrap();
    assert!(watcher.await.unwrap());
}

#[tokio::test]
async fn test_login_then_reload_restores_same_user() {
    let backend = MockBackend::start().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");

    let first = backend.manager_with_store(Arc::new(FileTokenStore::new(&path)));
    first.bootstrap().await;
    let user = first.login(EMAIL, PASSWORD).await.unwrap();
    drop(first);

    // A new manager on the same file behaves like a page reload.
    let reloaded = backend.manager_with_store(Arc::new(FileTokenStore::new(&path)));
    let outcome = reloaded.bootstrap().await;

    assert_eq!(outcome, BootstrapOutcome::Restored(user.clone()));
    assert_eq!(reloaded.current_user().map(|u| u.id), Some(user.id));
}

#[tokio::test]
async fn test_refresh_profile_replaces_user() {
    let backend = MockBackend::start().await;
    let (session, _) = backend.manager();
    session.login(EMAIL, PASSWORD).await.unwrap();

    let profile = session.refresh_profile().await.unwrap();

    assert_eq!(profile.extra.get("office"), Some(&serde_json::json!("Downtown")));
    assert_eq!(session.current_user(), Some(profile));
}
