//! Integration tests for the cart.
//!
//! These tests require a running storefront with a seeded catalog and
//! database access for the admin helper.

use reqwest::StatusCode;
use retro_vault_integration_tests::{TestClient, admin_client, json_body, stocked_game};
use serde_json::json;

/// Index into the sorted catalog reserved for this file.
const GAME_INDEX: usize = 3;

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_add_update_remove() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, GAME_INDEX, 10).await;

    let client = TestClient::new();
    client.register().await;

    let resp = client
        .post("/api/cart", &json!({ "game_id": game["id"], "quantity": 2 }))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let cart = json_body(resp).await;
    assert_eq!(cart["item_count"], 2);

    // Adding again merges into the same line
    let cart = json_body(
        client
            .post("/api/cart", &json!({ "game_id": game["id"] }))
            .await,
    )
    .await;
    assert_eq!(cart["lines"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["lines"][0]["quantity"], 3);

    let count = json_body(client.get("/api/cart/count").await).await;
    assert_eq!(count["count"], 3);

    let line_id = cart["lines"][0]["id"].clone();
    let resp = client
        .patch(&format!("/api/cart/{line_id}"), &json!({ "quantity": 5 }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["lines"][0]["quantity"], 5);

    // Zero removes the line
    let resp = client
        .patch(&format!("/api/cart/{line_id}"), &json!({ "quantity": 0 }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["item_count"], 0);

    let resp = client.delete(&format!("/api/cart/{line_id}"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_rejects_bad_quantities() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, GAME_INDEX, 10).await;

    let client = TestClient::new();
    client.register().await;

    for quantity in [0, -1, 1000] {
        let resp = client
            .post(
                "/api/cart",
                &json!({ "game_id": game["id"], "quantity": quantity }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "quantity {quantity}");
    }

    let resp = client
        .post("/api/cart", &json!({ "game_id": game["id"], "quantity": "two" }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront server and database"]
async fn test_cart_rejects_more_than_stock() {
    let admin = admin_client().await;
    let game = stocked_game(&admin, GAME_INDEX, 10).await;

    let client = TestClient::new();
    client.register().await;

    let resp = client
        .post("/api/cart", &json!({ "game_id": game["id"], "quantity": 11 }))
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(json_body(resp).await["error"].as_str().is_some());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_cart_unknown_game_is_not_found() {
    let client = TestClient::new();
    client.register().await;

    let resp = client
        .post("/api/cart", &json!({ "game_id": 999_999, "quantity": 1 }))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_carts_are_private() {
    let owner = TestClient::new();
    owner.register().await;
    let games = json_body(owner.get("/api/games").await).await;
    let game_id = games["items"][0]["id"].clone();
    let cart = json_body(
        owner
            .post("/api/cart", &json!({ "game_id": game_id }))
            .await,
    )
    .await;
    let Some(line_id) = cart["lines"][0]["id"].as_i64() else {
        // First game is out of stock; nothing to check
        return;
    };

    let other = TestClient::new();
    other.register().await;
    let resp = other
        .patch(&format!("/api/cart/{line_id}"), &json!({ "quantity": 2 }))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
