//! CSRF protection on state-changing requests.

#![allow(clippy::unwrap_used)]

use emporium_integration_tests::{TestApp, location};
use reqwest::StatusCode;

#[tokio::test]
async fn test_post_without_session_is_forbidden() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let response = browser
        .post_form_raw("/login", &[("email", "jane@example.com"), ("password", "secret1")])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response.text().await.unwrap();
    assert!(body.contains("Forbidden"));
}

#[tokio::test]
async fn test_post_without_token_is_forbidden() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.csrf_token().await;

    let response = browser
        .post_form_raw(
            "/signup",
            &[
                ("email", "jane@example.com"),
                ("password", "secret1"),
                ("confirmPassword", "secret1"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.store.user_count().await, 0);
}

#[tokio::test]
async fn test_post_with_wrong_token_is_forbidden() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    let token = browser.csrf_token().await;
    let forged = format!("{token}x");

    let response = browser
        .post_form_raw("/reset", &[("email", "jane@example.com"), ("_csrf", &forged)])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_from_another_session_is_forbidden() {
    let app = TestApp::spawn().await;
    let victim = app.browser();
    let attacker = app.browser();
    victim.csrf_token().await;
    let attacker_token = attacker.csrf_token().await;

    let response = victim
        .post_form_raw("/logout", &[("_csrf", &attacker_token)])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_is_stable_within_a_session() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let first = browser.csrf_token().await;
    let second = browser.csrf_token().await;
    assert_eq!(first, second);

    let response = browser.post_form_raw("/logout", &[("_csrf", &first)]).await;
    assert_eq!(location(&response), Some("/"));
}

#[tokio::test]
async fn test_safe_methods_skip_the_check() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let (status, _) = browser.page("/login").await;
    assert_eq!(status, StatusCode::OK);
}
