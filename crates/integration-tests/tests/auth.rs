//! Integration tests for registration, login and sessions.
//!
//! These tests require a running storefront (see the crate docs).

use reqwest::StatusCode;
use retro_vault_integration_tests::{TEST_PASSWORD, TestClient, json_body, unique_email};
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_endpoints() {
    let client = TestClient::new();

    let resp = client.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap_or_default(), "ok");

    let resp = client.get("/health/ready").await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_register_logs_in() {
    let client = TestClient::new();
    let (email, user) = client.register().await;

    assert_eq!(user["email"], email.as_str());
    assert_eq!(user["role"], "customer");
    assert!(user.get("password_hash").is_none());

    let me = json_body(client.get("/api/auth/me").await).await;
    assert_eq!(me["email"], email.as_str());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_register_duplicate_email_conflicts() {
    let client = TestClient::new();
    let (email, _) = client.register().await;

    let other = TestClient::new();
    let resp = other
        .post(
            "/api/auth/register",
            &json!({ "email": email.to_uppercase(), "password": TEST_PASSWORD, "name": "Dup" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_register_validation() {
    let client = TestClient::new();

    let resp = client
        .post(
            "/api/auth/register",
            &json!({ "email": "not-an-email", "password": TEST_PASSWORD, "name": "X" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(
            "/api/auth/register",
            &json!({ "email": unique_email(), "password": "short", "name": "X" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_login_failures_are_indistinguishable() {
    let client = TestClient::new();
    let (email, _) = client.register().await;

    let anon = TestClient::new();
    let wrong_password = anon.login(&email, "definitely-wrong").await;
    let unknown_user = anon.login(&unique_email(), TEST_PASSWORD).await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(wrong_password).await, json_body(unknown_user).await);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_logout_ends_session() {
    let client = TestClient::new();
    let (email, _) = client.register().await;

    let resp = client.post("/api/auth/logout", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client.get("/api/auth/me").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client.login(&email, TEST_PASSWORD).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(client.get("/api/auth/me").await.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_protected_routes_require_login() {
    let client = TestClient::new();

    for path in ["/api/cart", "/api/checkout/summary", "/api/account/orders", "/api/wishlist"] {
        let resp = client.get(path).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_responses_carry_security_headers() {
    let client = TestClient::new();
    let resp = client.get("/api/games").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("x-request-id"));
}
