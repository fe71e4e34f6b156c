//! Integration tests for the back-office.
//!
//! Requires the storefront running with simulated payments, a seeded
//! catalog and database access for promoting the admin.

use reqwest::StatusCode;
use retro_vault_core::OrderStatus;
use retro_vault_integration_tests::{
    TestClient, admin_client, json_body, stocked_game, test_address,
};
use serde_json::{Value, json};

/// Index into the sorted catalog reserved for this file.
const GAME_INDEX: usize = 8;

/// Place a simulated card order for one copy of `game`.
async fn place_order(client: &TestClient, game: &Value) -> Value {
    client
        .post("/api/cart", &json!({ "game_id": game["id"], "quantity": 1 }))
        .await;
    let intent = json_body(client.post("/api/checkout/stripe/intent", &json!({})).await).await;
    let resp = client
        .post(
            "/api/checkout/stripe/confirm",
            &json!({
                "payment_intent_id": intent["payment_intent_id"],
                "shipping_address": test_address(),
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_back_office_requires_admin() {
    let anon = TestClient::new();
    let resp = anon.get("/api/admin/dashboard").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let customer = TestClient::new();
    customer.register().await;
    for path in ["/api/admin/dashboard", "/api/admin/orders"] {
        let resp = customer.get(path).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
    }

    let resp = customer
        .put("/api/admin/games/1/stock", &json!({ "stock": 100 }))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_dashboard_counts() {
    let admin = admin_client().await;

    let resp = admin.get("/api/admin/dashboard").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let dashboard = json_body(resp).await;

    assert!(dashboard["user_count"].as_i64().unwrap_or(0) >= 1);
    assert!(dashboard["game_count"].as_i64().unwrap_or(0) >= 1);
    assert!(dashboard["orders_by_status"].is_object());
    assert!(dashboard["low_stock"].is_array());
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_order_fulfilment_flow() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, GAME_INDEX, 20).await;

    let customer = TestClient::new();
    customer.register().await;
    let order = place_order(&customer, &game).await;
    let path = format!("/api/admin/orders/{}", order["id"]);

    let listed = json_body(admin.get("/api/admin/orders?status=processing").await).await;
    assert!(
        listed["items"]
            .as_array()
            .is_some_and(|items| items.iter().any(|o| o["id"] == order["id"]))
    );

    let resp = admin
        .patch(
            &path,
            &json!({
                "status": OrderStatus::Shipped,
                "shipping_carrier": "UPS",
                "tracking_number": "1Z999",
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let shipped = json_body(resp).await;
    assert_eq!(shipped["status"], "shipped");
    assert_eq!(shipped["tracking_number"], "1Z999");
    assert!(shipped["shipped_at"].as_str().is_some());

    // Customers can no longer cancel once shipped
    let resp = customer
        .post(&format!("/api/account/orders/{}/cancel", order["id"]), &json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = admin.patch(&path, &json!({ "status": OrderStatus::Delivered })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(json_body(resp).await["delivered_at"].as_str().is_some());

    // Delivered is terminal
    let resp = admin.patch(&path, &json!({ "status": OrderStatus::Processing })).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_admin_input_validation() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, GAME_INDEX, 20).await;

    let resp = admin
        .put(
            &format!("/api/admin/games/{}/stock", game["id"]),
            &json!({ "stock": -1 }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = admin
        .put("/api/admin/games/999999/stock", &json!({ "stock": 1 }))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = admin.get("/api/admin/orders?status=lost").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = admin
        .patch("/api/admin/orders/999999", &json!({ "status": "shipped" }))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_role_changes() {
    let admin = admin_client().await;
    let me = json_body(admin.get("/api/auth/me").await).await;

    let resp = admin
        .put(
            &format!("/api/admin/users/{}/role", me["id"]),
            &json!({ "role": "customer" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let customer = TestClient::new();
    let (_, user) = customer.register().await;
    let resp = admin
        .put(
            &format!("/api/admin/users/{}/role", user["id"]),
            &json!({ "role": "admin" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["role"], "admin");

    // Promotion applies to the existing session
    assert_eq!(
        customer.get("/api/admin/dashboard").await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cannot_delete_console_in_use() {
    let admin = admin_client().await;
    let consoles = json_body(admin.get("/api/consoles").await).await;
    let Some(console) = consoles
        .as_array()
        .and_then(|all| all.iter().find(|c| c["game_count"].as_i64() > Some(0)))
    else {
        return;
    };

    let resp = admin
        .delete(&format!("/api/admin/consoles/{}", console["id"]), None)
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
