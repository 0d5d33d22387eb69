mod common;

use chrono::Duration;
use common::{PASSWORD, RecordingNotifier, spawn, spawn_with};
use schooldesk::domain::Role;
use schooldesk::config::SecurityConfig;
use schooldesk::services::{AuthError, Clock, TokenError};
use std::time::{Duration as StdDuration, Instant};

#[tokio::test]
async fn admin_login_issues_token_without_code() {
    let app = spawn().await;
    app.account("principal@school.example", Role::Admin).await;

    let result = app
        .state
        .auth_service
        .login("principal@school.example", PASSWORD)
        .await
        .expect("admin login");

    assert!(!result.requires_verification);
    let token = result.token.expect("admin receives a token");
    assert_eq!(
        result.expires_at.map(|at| at - app.clock.now()),
        Some(Duration::hours(1))
    );

    let principal = app.state.auth_service.authenticate(&token).unwrap();
    assert_eq!(principal.role, Role::Admin);
    assert_eq!(
        app.store()
            .count_verification_codes("principal@school.example")
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn student_login_requires_code_then_issues_token() {
    let app = spawn().await;
    let account = app.account("ada@student.example", Role::Student).await;

    let first = app
        .state
        .auth_service
        .login("Ada@Student.example ", PASSWORD)
        .await
        .unwrap();
    assert!(first.requires_verification);
    assert!(first.token.is_none());
    assert_eq!(first.user.email, "ada@student.example");

    let code = app.nth_code("ada@student.example", 1).await;
    assert_eq!(code.len(), 6);

    let verified = app
        .state
        .auth_service
        .verify_code("ada@student.example", &code)
        .await
        .unwrap();
    assert!(!verified.requires_verification);

    let principal = app
        .state
        .auth_service
        .authenticate(verified.token.as_deref().unwrap())
        .unwrap();
    assert_eq!(principal.account_id, account.id);
    assert_eq!(principal.role, Role::Student);
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let app = spawn().await;
    app.account("lee@leader.example", Role::Leader).await;

    let wrong = app
        .state
        .auth_service
        .login("lee@leader.example", "not-the-password")
        .await
        .unwrap_err();
    let unknown = app
        .state
        .auth_service
        .login("nobody@leader.example", PASSWORD)
        .await
        .unwrap_err();

    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert_eq!(wrong.to_string(), unknown.to_string());
    assert_eq!(
        app.store()
            .count_verification_codes("lee@leader.example")
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn unknown_email_costs_as_much_as_wrong_password() {
    let app = spawn().await;
    let security = SecurityConfig {
        argon2_memory_cost_kib: 8192,
        argon2_time_cost: 2,
        ..app.state.config.security.clone()
    };
    app.store()
        .create_account(
            "ada@student.example",
            PASSWORD,
            Role::Student,
            &security,
            app.clock.now(),
        )
        .await
        .unwrap();

    let mut known = StdDuration::ZERO;
    let mut unknown = StdDuration::ZERO;
    for _ in 0..3 {
        let started = Instant::now();
        let miss = app
            .store()
            .verify_account_password("ada@student.example", "wrong horse", &security)
            .await
            .unwrap();
        known += started.elapsed();
        assert!(miss.is_none());

        let started = Instant::now();
        let miss = app
            .store()
            .verify_account_password("nobody@student.example", "wrong horse", &security)
            .await
            .unwrap();
        unknown += started.elapsed();
        assert!(miss.is_none());
    }

    assert!(
        unknown * 4 >= known,
        "unknown email took {unknown:?}, wrong password took {known:?}"
    );
}

#[tokio::test]
async fn login_succeeds_when_code_delivery_fails() {
    let app = spawn_with(RecordingNotifier::failing()).await;
    app.account("ada@student.example", Role::Student).await;
    let auth = &app.state.auth_service;

    let result = auth.login("ada@student.example", PASSWORD).await.unwrap();
    assert!(result.requires_verification);
    assert!(result.token.is_none());

    let code = app.nth_code("ada@student.example", 1).await;
    let verified = auth.verify_code("ada@student.example", &code).await.unwrap();
    assert!(verified.token.is_some());
}

#[tokio::test]
async fn resend_succeeds_when_code_delivery_fails() {
    let app = spawn_with(RecordingNotifier::failing()).await;
    app.account("lee@leader.example", Role::Leader).await;
    let auth = &app.state.auth_service;

    auth.login("lee@leader.example", PASSWORD).await.unwrap();
    auth.resend_code("lee@leader.example").await.unwrap();

    let code = app.nth_code("lee@leader.example", 2).await;
    assert!(auth.verify_code("lee@leader.example", &code).await.is_ok());
}

#[tokio::test]
async fn new_code_invalidates_previous_one() {
    let app = spawn().await;
    app.account("ada@student.example", Role::Student).await;
    let auth = &app.state.auth_service;

    auth.login("ada@student.example", PASSWORD).await.unwrap();
    let first = app.nth_code("ada@student.example", 1).await;

    // A fresh code can repeat the old one by chance; resend until it differs.
    let mut sent = 1;
    let mut second = first.clone();
    while second == first {
        assert!(sent < 6, "resend kept producing the same code");
        auth.resend_code("ada@student.example").await.unwrap();
        sent += 1;
        second = app.nth_code("ada@student.example", sent).await;
    }

    assert_eq!(
        app.store()
            .count_verification_codes("ada@student.example")
            .await
            .unwrap(),
        1
    );

    assert!(matches!(
        auth.verify_code("ada@student.example", &first).await,
        Err(AuthError::InvalidCode)
    ));
    assert!(auth.verify_code("ada@student.example", &second).await.is_ok());
}

#[tokio::test]
async fn code_is_single_use() {
    let app = spawn().await;
    app.account("ada@student.example", Role::Student).await;
    let auth = &app.state.auth_service;

    auth.login("ada@student.example", PASSWORD).await.unwrap();
    let code = app.nth_code("ada@student.example", 1).await;

    auth.verify_code("ada@student.example", &code).await.unwrap();
    assert!(matches!(
        auth.verify_code("ada@student.example", &code).await,
        Err(AuthError::InvalidCode)
    ));
}

#[tokio::test]
async fn code_is_valid_for_ten_minutes() {
    let app = spawn().await;
    app.account("ada@student.example", Role::Student).await;
    app.account("bo@student.example", Role::Student).await;
    let auth = &app.state.auth_service;

    auth.login("ada@student.example", PASSWORD).await.unwrap();
    auth.login("bo@student.example", PASSWORD).await.unwrap();
    let ada_code = app.nth_code("ada@student.example", 1).await;
    let bo_code = app.nth_code("bo@student.example", 1).await;

    app.clock.advance(Duration::minutes(9) + Duration::seconds(59));
    assert!(auth.verify_code("ada@student.example", &ada_code).await.is_ok());

    app.clock.advance(Duration::seconds(1));
    assert!(matches!(
        auth.verify_code("bo@student.example", &bo_code).await,
        Err(AuthError::CodeExpired)
    ));
    // The expired row is gone; a retry no longer reports expiry.
    assert!(matches!(
        auth.verify_code("bo@student.example", &bo_code).await,
        Err(AuthError::InvalidCode)
    ));
}

#[tokio::test]
async fn malformed_code_is_rejected() {
    let app = spawn().await;
    app.account("ada@student.example", Role::Student).await;
    let auth = &app.state.auth_service;

    auth.login("ada@student.example", PASSWORD).await.unwrap();
    app.nth_code("ada@student.example", 1).await;

    for bad in ["", "12345", "1234567", "abcdef"] {
        assert!(matches!(
            auth.verify_code("ada@student.example", bad).await,
            Err(AuthError::InvalidCode)
        ));
    }
}

#[tokio::test]
async fn resend_for_unknown_account_fails() {
    let app = spawn().await;

    assert!(matches!(
        app.state.auth_service.resend_code("ghost@student.example").await,
        Err(AuthError::AccountNotFound)
    ));
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn resend_delivers_a_working_code() {
    let app = spawn().await;
    app.account("lee@leader.example", Role::Leader).await;
    let auth = &app.state.auth_service;

    auth.resend_code("lee@leader.example").await.unwrap();
    let code = app.nth_code("lee@leader.example", 1).await;

    let result = auth.verify_code("lee@leader.example", &code).await.unwrap();
    assert_eq!(result.user.role, Role::Leader);
}

#[tokio::test]
async fn session_token_expires_after_an_hour() {
    let app = spawn().await;
    app.account("principal@school.example", Role::Admin).await;
    let auth = &app.state.auth_service;

    let token = auth
        .login("principal@school.example", PASSWORD)
        .await
        .unwrap()
        .token
        .unwrap();

    app.clock.advance(Duration::minutes(59));
    assert!(auth.authenticate(&token).is_ok());

    app.clock.advance(Duration::minutes(1));
    assert_eq!(auth.authenticate(&token), Err(TokenError::Expired));
}

#[tokio::test]
async fn registration_rejects_admin_and_duplicates() {
    let app = spawn().await;
    let auth = &app.state.auth_service;

    let info = auth
        .register("New@Student.example", PASSWORD, Role::Student)
        .await
        .unwrap();
    assert_eq!(info.email, "new@student.example");

    assert!(matches!(
        auth.register("new@student.example", PASSWORD, Role::Student).await,
        Err(AuthError::EmailTaken)
    ));
    assert!(matches!(
        auth.register("boss@school.example", PASSWORD, Role::Admin).await,
        Err(AuthError::Validation(_))
    ));
    assert!(matches!(
        auth.register("short@student.example", "abc", Role::Student).await,
        Err(AuthError::Validation(_))
    ));
}

#[tokio::test]
async fn purge_removes_only_expired_codes() {
    let app = spawn().await;
    app.account("ada@student.example", Role::Student).await;
    let auth = &app.state.auth_service;

    auth.login("ada@student.example", PASSWORD).await.unwrap();
    app.nth_code("ada@student.example", 1).await;

    let purged = schooldesk::services::scheduler::purge_expired_codes(app.store(), &*app.clock)
        .await
        .unwrap();
    assert_eq!(purged, 0);

    app.clock.advance(Duration::minutes(11));
    let purged = schooldesk::services::scheduler::purge_expired_codes(app.store(), &*app.clock)
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert_eq!(
        app.store()
            .count_verification_codes("ada@student.example")
            .await
            .unwrap(),
        0
    );
}
