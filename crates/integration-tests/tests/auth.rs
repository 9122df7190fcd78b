//! Signup, login, logout and password reset over HTTP.

#![allow(clippy::unwrap_used)]

use emporium_integration_tests::{DEFAULT_PASSWORD, TestApp, location};
use reqwest::StatusCode;

#[tokio::test]
async fn test_signup_login_logout() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let response = browser.signup("jane@example.com", "secret1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    let (_, body) = browser.page("/login").await;
    assert!(body.contains("Your account has been created"));

    // Emails are matched case-insensitively
    let response = browser.login("Jane@Example.COM", "secret1").await;
    assert_eq!(location(&response), Some("/"));

    let (status, body) = browser.page("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("jane@example.com"));
    assert!(body.contains("Logout"));

    let response = browser.post_form("/logout", &[]).await;
    assert_eq!(location(&response), Some("/"));

    let (_, body) = browser.page("/").await;
    assert!(!body.contains("jane@example.com"));
    assert!(body.contains("href=\"/login\""));
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_look_the_same() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup("jane@example.com", "secret1").await;

    let response = browser.login("jane@example.com", "wrong-password").await;
    assert_eq!(location(&response), Some("/login"));
    let (_, wrong_password) = browser.page("/login").await;

    let response = browser.login("nobody@example.com", "secret1").await;
    assert_eq!(location(&response), Some("/login"));
    let (_, unknown_email) = browser.page("/login").await;

    assert!(wrong_password.contains("Invalid email or password."));
    assert!(unknown_email.contains("Invalid email or password."));
}

#[tokio::test]
async fn test_login_validation_rerenders_form() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let response = browser.login("not-an-email", "").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.text().await.unwrap();
    assert!(body.contains("value=\"not-an-email\""));
    assert!(body.contains("class=\"invalid\""));
}

#[tokio::test]
async fn test_signup_rejects_mismatched_passwords() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let response = browser
        .post_form(
            "/signup",
            &[
                ("email", "jane@example.com"),
                ("password", "secret1"),
                ("confirmPassword", "secret2"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.text().await.unwrap();
    assert!(body.contains("Passwords have to match!"));
    assert_eq!(app.store.user_count().await, 0);
}

#[tokio::test]
async fn test_signup_rejects_taken_email() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup("jane@example.com", "secret1").await;

    let response = browser.signup("JANE@example.com", "other-secret").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.text().await.unwrap();
    assert!(body.contains("E-mail already exists"));
    assert_eq!(app.store.user_count().await, 1);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup("jane@example.com", "secret1").await;

    let response = browser
        .post_form("/reset", &[("email", "jane@example.com")])
        .await;
    assert_eq!(location(&response), Some("/"));
    let (_, body) = browser.page("/").await;
    assert!(body.contains("Check your inbox"));

    let user = app.user("jane@example.com").await;
    let token = user.reset.expect("reset token issued").token;
    let user_id = user.id.to_string();

    let (status, body) = browser.page(&format!("/reset/{token}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&token));
    assert!(body.contains(&format!("name=\"userId\" value=\"{user_id}\"")));

    let response = browser
        .post_form(
            "/new-password",
            &[
                ("password", "brand-new-1"),
                ("userId", &user_id),
                ("passwordToken", &token),
            ],
        )
        .await;
    assert_eq!(location(&response), Some("/login"));

    let response = browser.login("jane@example.com", "secret1").await;
    assert_eq!(location(&response), Some("/login"));
    let response = browser.login("jane@example.com", "brand-new-1").await;
    assert_eq!(location(&response), Some("/"));

    // The token is single use
    let response = browser.get(&format!("/reset/{token}")).await;
    assert_eq!(location(&response), Some("/reset"));
    assert!(app.user("jane@example.com").await.reset.is_none());
}

#[tokio::test]
async fn test_reset_for_unknown_email() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let response = browser
        .post_form("/reset", &[("email", "nobody@example.com")])
        .await;
    assert_eq!(location(&response), Some("/reset"));
    let (_, body) = browser.page("/reset").await;
    assert!(body.contains("No account with that email found."));
}

#[tokio::test]
async fn test_reset_with_bad_token() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let response = browser.get("/reset/not-a-real-token").await;
    assert_eq!(location(&response), Some("/reset"));
    let (_, body) = browser.page("/reset").await;
    assert!(body.contains("invalid or has expired"));

    let response = browser
        .post_form(
            "/new-password",
            &[
                ("password", "brand-new-1"),
                ("userId", "1"),
                ("passwordToken", "not-a-real-token"),
            ],
        )
        .await;
    assert_eq!(location(&response), Some("/reset"));
}

#[tokio::test]
async fn test_protected_pages_redirect_to_login() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    for path in ["/cart", "/orders", "/admin/products", "/admin/add-product"] {
        let response = browser.get(path).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), Some("/login"), "{path}");
    }
}

#[tokio::test]
async fn test_auth_posts_are_rate_limited() {
    let app = TestApp::spawn_with(|config| config.rate_limit_auth = true).await;
    let browser = app.browser();

    let mut statuses = Vec::new();
    for _ in 0..6 {
        let response = browser.login("jane@example.com", DEFAULT_PASSWORD).await;
        statuses.push(response.status());
    }

    assert!(statuses.iter().take(5).all(|s| *s == StatusCode::SEE_OTHER));
    assert_eq!(statuses.last(), Some(&StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_forwarded_for_does_not_reset_rate_limit() {
    let app = TestApp::spawn_with(|config| config.rate_limit_auth = true).await;
    let browser = app.browser();

    let mut statuses = Vec::new();
    for i in 0..20 {
        let forwarded_for = format!("10.0.0.{i}");
        let response = browser
            .login_forwarded_for("jane@example.com", DEFAULT_PASSWORD, &forwarded_for)
            .await;
        statuses.push(response.status());
    }

    assert!(statuses.iter().take(5).all(|s| *s == StatusCode::SEE_OTHER));
    assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
    // One slot replenishes every 6 seconds, so a slow run may admit a few more
    let admitted = statuses
        .iter()
        .filter(|s| **s == StatusCode::SEE_OTHER)
        .count();
    assert!(admitted < 10, "{admitted} of 20 logins admitted");
}

#[tokio::test]
async fn test_trusted_proxy_limits_per_forwarded_client() {
    let app = TestApp::spawn_with(|config| {
        config.rate_limit_auth = true;
        config.trust_proxy_headers = true;
    })
    .await;
    let browser = app.browser();

    for _ in 0..5 {
        let response = browser
            .login_forwarded_for("jane@example.com", DEFAULT_PASSWORD, "203.0.113.7")
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
    let limited = browser
        .login_forwarded_for("jane@example.com", DEFAULT_PASSWORD, "203.0.113.7")
        .await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = browser
        .login_forwarded_for("jane@example.com", DEFAULT_PASSWORD, "203.0.113.8")
        .await;
    assert_eq!(other.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_session_of_deleted_user_is_anonymous() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup_and_login("jane@example.com").await;

    let (_, body) = browser.page("/").await;
    assert!(body.contains("Logout"));

    let user = app.user("jane@example.com").await;
    assert!(app.store.remove_user(user.id).await);

    let (status, body) = browser.page("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("href=\"/login\""));
    assert!(!body.contains("Logout"));

    let response = browser.get("/cart").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn test_redirecting_post_keeps_pending_flash() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    let token = browser.csrf_token().await;

    // Signup leaves a flash for the login page; skip that page and log in
    let response = browser
        .post_form_raw(
            "/signup",
            &[
                ("email", "jane@example.com"),
                ("password", DEFAULT_PASSWORD),
                ("confirmPassword", DEFAULT_PASSWORD),
                ("_csrf", &token),
            ],
        )
        .await;
    assert_eq!(location(&response), Some("/login"));

    let response = browser
        .post_form_raw(
            "/login",
            &[
                ("email", "jane@example.com"),
                ("password", DEFAULT_PASSWORD),
                ("_csrf", &token),
            ],
        )
        .await;
    assert_eq!(location(&response), Some("/"));

    let (_, body) = browser.page("/").await;
    assert!(body.contains("Your account has been created"));

    let (_, body) = browser.page("/").await;
    assert!(!body.contains("Your account has been created"));
}
