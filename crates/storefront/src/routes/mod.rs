//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited)
//! POST   /api/auth/register               - Create a customer account and log in
//! POST   /api/auth/login                  - Log in
//! POST   /api/auth/logout                 - Log out
//! GET    /api/auth/me                     - Current user
//!
//! # Catalog
//! GET    /api/games                       - Paginated game list
//! GET    /api/games/featured              - Featured games
//! GET    /api/games/{slug}                - Game detail
//! GET    /api/games/{slug}/reviews        - Reviews for a game
//! POST   /api/games/{slug}/reviews        - Review a game
//! GET    /api/consoles                    - Consoles with game counts
//! GET    /api/categories                  - Categories with game counts
//!
//! # Cart (requires auth)
//! GET    /api/cart                        - Cart lines and subtotal
//! POST   /api/cart                        - Add a game
//! DELETE /api/cart                        - Empty the cart
//! GET    /api/cart/count                  - Units in cart
//! PATCH  /api/cart/{id}                   - Change quantity (0 removes)
//! DELETE /api/cart/{id}                   - Remove a line
//!
//! # Checkout (requires auth)
//! GET    /api/checkout/summary            - Quote
//! POST   /api/checkout/stripe/intent      - Start a card payment
//! POST   /api/checkout/stripe/confirm     - Confirm a card payment, place order
//! POST   /api/checkout/paypal/order       - Start a PayPal payment
//! POST   /api/checkout/paypal/capture     - Capture a PayPal payment, place order
//!
//! # Reviews & wishlist (requires auth)
//! DELETE /api/reviews/{id}                - Delete own review (admins: any)
//! POST   /api/reviews/{id}/vote           - Vote a review helpful or not
//! GET    /api/wishlist                    - Saved games
//! POST   /api/wishlist                    - Save a game
//! DELETE /api/wishlist/{game_id}          - Unsave a game
//!
//! # Account (requires auth)
//! GET    /api/account/profile             - Profile
//! PATCH  /api/account/profile             - Update profile
//! PATCH  /api/account/settings            - Update notification/privacy flags
//! PUT    /api/account/password            - Change password
//! DELETE /api/account                     - Delete account
//! GET    /api/account/orders              - Order history
//! GET    /api/account/orders/{id}         - Order detail
//! POST   /api/account/orders/{id}/cancel  - Cancel an unshipped order
//!
//! # Webhooks
//! POST   /api/webhooks/stripe             - Stripe events (signature checked)
//! POST   /api/webhooks/paypal             - PayPal events
//!
//! # Back-office (requires admin)
//! GET    /api/admin/dashboard             - Counters
//! GET    /api/admin/orders                - Orders, filterable by status
//! GET    /api/admin/orders/{id}           - Order detail
//! PATCH  /api/admin/orders/{id}           - Status and shipping details
//! PUT    /api/admin/games/{id}/stock      - Set stock
//! DELETE /api/admin/consoles/{id}         - Delete an unused console
//! DELETE /api/admin/categories/{id}       - Delete an unused category
//! PUT    /api/admin/users/{id}/role       - Change a user's role
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod reviews;
pub mod webhooks;
pub mod wishlist;

use axum::{
    Router,
    extract::FromRequest,
    routing::{delete, get, patch, post, put},
};

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// `axum::Json` with rejections rendered as [`AppError`] JSON.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/games", get(catalog::list_games))
        .route("/games/featured", get(catalog::featured))
        .route("/games/{slug}", get(catalog::show_game))
        .route(
            "/games/{slug}/reviews",
            get(reviews::list).post(reviews::create),
        )
        .route("/consoles", get(catalog::consoles))
        .route("/categories", get(catalog::categories))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/count", get(cart::count))
        .route("/{id}", patch(cart::update).delete(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(checkout::summary))
        .route("/stripe/intent", post(checkout::stripe_intent))
        .route("/stripe/confirm", post(checkout::stripe_confirm))
        .route("/paypal/order", post(checkout::paypal_order))
        .route("/paypal/capture", post(checkout::paypal_capture))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", delete(account::delete_account))
        .route(
            "/profile",
            get(account::profile).patch(account::update_profile),
        )
        .route("/settings", patch(account::update_settings))
        .route("/password", put(account::change_password))
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
        .route("/orders/{id}/cancel", post(account::cancel_order))
}

/// Create the review and wishlist routes router.
pub fn community_routes() -> Router<AppState> {
    Router::new()
        .route("/reviews/{id}", delete(reviews::delete))
        .route("/reviews/{id}/vote", post(reviews::vote))
        .route("/wishlist", get(wishlist::list).post(wishlist::add))
        .route("/wishlist/{game_id}", delete(wishlist::remove))
}

/// Create the webhook routes router.
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/stripe", post(webhooks::stripe))
        .route("/paypal", post(webhooks::paypal))
}

/// Create the back-office routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/orders", get(admin::orders))
        .route("/orders/{id}", get(admin::order).patch(admin::update_order))
        .route("/games/{id}/stock", put(admin::set_stock))
        .route("/consoles/{id}", delete(admin::delete_console))
        .route("/categories/{id}", delete(admin::delete_category))
        .route("/users/{id}/role", put(admin::set_role))
}

/// Create all `/api` routes for the storefront.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/account", account_routes())
        .merge(community_routes())
        .nest("/webhooks", webhook_routes())
        .nest("/admin", admin_routes())
        .layer(api_rate_limiter());

    Router::new().nest("/api", api)
}
