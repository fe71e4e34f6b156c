//! Integration tests for checkout with simulated payment providers.
//!
//! Requires the storefront running with `PAYMENTS_SIMULATE=true`, a seeded
//! catalog and database access for the admin helper.

use reqwest::StatusCode;
use retro_vault_integration_tests::{
    TestClient, admin_client, json_body, stocked_game, test_address,
};
use serde_json::{Value, json};

/// Game shared by tests that never place an order, so its stock stays put.
const UNPLACED_INDEX: usize = 7;

/// Current stock of `game`, read through the public catalog.
async fn stock_of(client: &TestClient, game: &Value) -> i64 {
    let slug = game["slug"].as_str().unwrap_or_default();
    let detail = json_body(client.get(&format!("/api/games/{slug}")).await).await;
    detail["stock"].as_i64().unwrap_or(-1)
}

async fn customer_with_cart(game: &Value, quantity: i32) -> TestClient {
    let client = TestClient::new();
    client.register().await;
    let resp = client
        .post(
            "/api/cart",
            &json!({ "game_id": game["id"], "quantity": quantity }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    client
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_stripe_checkout_places_order() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, 0, 5).await;
    let client = customer_with_cart(&game, 2).await;

    let summary = json_body(client.get("/api/checkout/summary").await).await;
    assert_eq!(summary["item_count"], 2);

    let resp = client.post("/api/checkout/stripe/intent", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let intent = json_body(resp).await;
    assert!(intent["client_secret"].as_str().is_some());
    assert_eq!(intent["amount"], summary["total"]);

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
    let order = json_body(resp).await;
    assert_eq!(order["status"], "processing");
    assert_eq!(order["payment_method"], "stripe");
    assert_eq!(order["total"], summary["total"]);
    assert_eq!(order["shipping_address"]["country"], "US");
    assert_eq!(order["items"][0]["quantity"], 2);

    // Stock decremented and cart emptied
    assert_eq!(stock_of(&client, &game).await, 3);
    let cart = json_body(client.get("/api/cart").await).await;
    assert_eq!(cart["item_count"], 0);

    // Listed in the customer's history
    let orders = json_body(client.get("/api/account/orders").await).await;
    assert_eq!(orders["items"][0]["id"], order["id"]);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_stripe_confirm_is_idempotent() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, 1, 5).await;
    let client = customer_with_cart(&game, 1).await;

    let intent = json_body(client.post("/api/checkout/stripe/intent", &json!({})).await).await;
    let body = json!({
        "payment_intent_id": intent["payment_intent_id"],
        "shipping_address": test_address(),
    });

    let first = client.post("/api/checkout/stripe/confirm", &body).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first = json_body(first).await;

    let second = client.post("/api/checkout/stripe/confirm", &body).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(json_body(second).await["id"], first["id"]);

    // Stock only taken once
    assert_eq!(stock_of(&client, &game).await, 4);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_paypal_checkout_places_order() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, 2, 5).await;
    let client = customer_with_cart(&game, 1).await;

    let resp = client.post("/api/checkout/paypal/order", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let paypal = json_body(resp).await;
    assert!(paypal["order_id"].as_str().is_some());

    let resp = client
        .post(
            "/api/checkout/paypal/capture",
            &json!({ "order_id": paypal["order_id"], "shipping_address": test_address() }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order = json_body(resp).await;
    assert_eq!(order["payment_method"], "paypal");
    assert_eq!(stock_of(&client, &game).await, 4);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_confirm_rejects_foreign_or_unknown_payment() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, UNPLACED_INDEX, 50).await;

    let alice = customer_with_cart(&game, 1).await;
    let intent = json_body(alice.post("/api/checkout/stripe/intent", &json!({})).await).await;

    // Bob never started a payment
    let bob = customer_with_cart(&game, 1).await;
    let resp = bob
        .post(
            "/api/checkout/stripe/confirm",
            &json!({
                "payment_intent_id": intent["payment_intent_id"],
                "shipping_address": test_address(),
            }),
        )
        .await;
    assert!(resp.status().is_client_error());

    // Bob starts his own, then submits Alice's id
    bob.post("/api/checkout/stripe/intent", &json!({})).await;
    let resp = bob
        .post(
            "/api/checkout/stripe/confirm",
            &json!({
                "payment_intent_id": intent["payment_intent_id"],
                "shipping_address": test_address(),
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_confirm_validates_address() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, UNPLACED_INDEX, 50).await;
    let client = customer_with_cart(&game, 1).await;

    let intent = json_body(client.post("/api/checkout/stripe/intent", &json!({})).await).await;
    let mut address = test_address();
    address["line1"] = json!("   ");

    let resp = client
        .post(
            "/api/checkout/stripe/confirm",
            &json!({
                "payment_intent_id": intent["payment_intent_id"],
                "shipping_address": address,
            }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert!(body["fields"]["line1"].as_str().is_some());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_empty_cart_cannot_start_payment() {
    let client = TestClient::new();
    client.register().await;

    let resp = client.post("/api/checkout/stripe/intent", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client.post("/api/checkout/paypal/order", &json!({})).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_customer_cancel_restocks() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, 6, 5).await;
    let client = customer_with_cart(&game, 2).await;

    let intent = json_body(client.post("/api/checkout/stripe/intent", &json!({})).await).await;
    let order = json_body(
        client
            .post(
                "/api/checkout/stripe/confirm",
                &json!({
                    "payment_intent_id": intent["payment_intent_id"],
                    "shipping_address": test_address(),
                }),
            )
            .await,
    )
    .await;
    assert_eq!(stock_of(&client, &game).await, 3);

    let resp = client
        .post(&format!("/api/account/orders/{}/cancel", order["id"]), &json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "cancelled");
    assert_eq!(stock_of(&client, &game).await, 5);

    // Cancelling twice is a conflict
    let resp = client
        .post(&format!("/api/account/orders/{}/cancel", order["id"]), &json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_orders_are_private() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, 9, 5).await;
    let owner = customer_with_cart(&game, 1).await;

    let intent = json_body(owner.post("/api/checkout/stripe/intent", &json!({})).await).await;
    let order = json_body(
        owner
            .post(
                "/api/checkout/stripe/confirm",
                &json!({
                    "payment_intent_id": intent["payment_intent_id"],
                    "shipping_address": test_address(),
                }),
            )
            .await,
    )
    .await;
    let path = format!("/api/account/orders/{}", order["id"]);

    let resp = owner.get(&path).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["id"], order["id"]);

    let other = TestClient::new();
    other.register().await;
    assert_eq!(other.get(&path).await.status(), StatusCode::NOT_FOUND);
    let resp = other.post(&format!("{path}/cancel"), &json!({})).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Still the owner's to cancel
    let resp = owner.post(&format!("{path}/cancel"), &json!({})).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
