//! Integration tests for the Retro Vault storefront API.
//!
//! # Running Tests
//!
//! ```bash
//! # Prepare a database with the demo catalog
//! rv-cli migrate && rv-cli seed
//!
//! # Start the API with simulated payments
//! PAYMENTS_SIMULATE=true cargo run -p retro-vault-storefront
//!
//! # Run the ignored tests against it
//! cargo test -p retro-vault-integration-tests -- --ignored
//! ```
//!
//! `STOREFRONT_TEST_URL` points the tests at another server (default
//! `http://localhost:3000`). Tests that need an admin promote a fresh user
//! directly in the database named by `STOREFRONT_DATABASE_URL`.

use std::net::Ipv4Addr;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

/// Password used for every test account.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Base URL of the API under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A throwaway address for a new account.
#[must_use]
pub fn unique_email() -> String {
    format!("test-{}@retrovault.test", Uuid::new_v4().simple())
}

/// A valid shipping address body.
#[must_use]
pub fn test_address() -> Value {
    json!({
        "full_name": "Test Customer",
        "line1": "1 Warp Zone Way",
        "city": "Mushroom City",
        "state": "CA",
        "postal_code": "94000",
        "country": "us"
    })
}

/// Decode a JSON body.
///
/// # Panics
///
/// Panics if the body isn't JSON.
pub async fn json_body(resp: Response) -> Value {
    resp.json().await.expect("Response body is not JSON")
}

/// An HTTP client with its own cookie jar and client address.
///
/// Each client sends a random `X-Forwarded-For` so tests don't share a
/// rate-limit bucket.
pub struct TestClient {
    client: Client,
    base_url: String,
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClient {
    /// Create a logged-out client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client can't be built.
    #[must_use]
    pub fn new() -> Self {
        let [a, b, c, ..] = Uuid::new_v4().into_bytes();
        let ip = Ipv4Addr::new(10, a, b, c);

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_str(&ip.to_string()).expect("IP is a valid header value"),
        );

        let client = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url(),
        }
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET` a path.
    ///
    /// # Panics
    ///
    /// Panics if the request can't be sent.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// `POST` a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request can't be sent.
    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }

    /// `PATCH` a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request can't be sent.
    pub async fn patch(&self, path: &str, body: &Value) -> Response {
        self.client
            .patch(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PATCH request failed")
    }

    /// `PUT` a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request can't be sent.
    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("PUT request failed")
    }

    /// `DELETE` a path, with an optional JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request can't be sent.
    pub async fn delete(&self, path: &str, body: Option<&Value>) -> Response {
        let mut request = self.client.delete(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.expect("DELETE request failed")
    }

    /// Register a fresh customer and stay logged in as them.
    ///
    /// Returns the email and the user JSON.
    ///
    /// # Panics
    ///
    /// Panics if registration doesn't return 201.
    pub async fn register(&self) -> (String, Value) {
        let email = unique_email();
        let resp = self
            .post(
                "/api/auth/register",
                &json!({ "email": email, "password": TEST_PASSWORD, "name": "Test Customer" }),
            )
            .await;
        assert_eq!(resp.status(), 201, "registration failed");
        (email, json_body(resp).await)
    }

    /// Log in as an existing account.
    ///
    /// # Panics
    ///
    /// Panics if the request can't be sent.
    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post(
            "/api/auth/login",
            &json!({ "email": email, "password": password }),
        )
        .await
    }
}

/// Connect to the storefront database.
///
/// # Panics
///
/// Panics if no database URL is set or the connection fails.
pub async fn pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL not set");
    PgPool::connect(&url)
        .await
        .expect("Failed to connect to database")
}

/// Register a customer and promote them to admin.
///
/// The back-office re-reads the role on every request, so the existing
/// session picks up the promotion.
///
/// # Panics
///
/// Panics if any step fails.
pub async fn admin_client() -> TestClient {
    let client = TestClient::new();
    let (email, _) = client.register().await;

    sqlx::query(
        "UPDATE users SET role_id = (SELECT id FROM roles WHERE name = 'admin') WHERE email = $1",
    )
    .bind(&email)
    .execute(&pool().await)
    .await
    .expect("Failed to promote test user");

    client
}

/// The `index`th game by slug, with its stock set to `stock` through the
/// admin API. Tests that run in parallel use different indexes.
///
/// # Panics
///
/// Panics if the catalog is too small or the admin call fails.
pub async fn stocked_game(admin: &TestClient, index: usize, stock: i32) -> Value {
    let page = json_body(admin.get("/api/games?per_page=100").await).await;
    let mut games = page["items"].as_array().cloned().unwrap_or_default();
    games.sort_by(|a, b| a["slug"].as_str().cmp(&b["slug"].as_str()));
    let game = games
        .get(index)
        .cloned()
        .expect("Catalog is too small; run `rv-cli seed`");

    let resp = admin
        .put(
            &format!("/api/admin/games/{}/stock", game["id"]),
            &json!({ "stock": stock }),
        )
        .await;
    assert_eq!(resp.status(), 200, "setting stock failed");

    game
}
