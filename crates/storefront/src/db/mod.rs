//! Database operations for the storefront `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `roles`, `users` - Accounts and their role
//! - `consoles`, `categories`, `games`, `game_categories`, `game_images` - Catalog
//! - `cart_items` - Per-user cart rows with a price snapshot
//! - `orders`, `order_items` - Placed orders with frozen prices
//! - `reviews`, `review_votes` - Game reviews and helpfulness votes
//! - `wishlist_items` - Saved games
//! - `tower_sessions.session` - Session storage (created by the session store)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p retro-vault-cli -- migrate
//! ```

/// Game listing columns that decode into `catalog::GameSummaryRow`.
///
/// Callers append `FROM games g JOIN consoles c ON c.id = g.console_id`.
macro_rules! game_summary_select {
    () => {
        r"
        SELECT g.id, g.title, g.slug, g.console_id, c.name AS console_name,
               g.price, g.sale_price, g.stock, g.condition, g.is_featured,
               (SELECT i.url FROM game_images i
                WHERE i.game_id = g.id
                ORDER BY i.is_primary DESC, i.sort_order, i.id
                LIMIT 1) AS image_url
        "
    };
}

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod reviews;
pub mod users;
pub mod wishlist;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use admin::AdminRepository;
pub use cart::CartRepository;
pub use catalog::CatalogRepository;
pub use orders::OrderRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;
pub use wishlist::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique-violation errors to `Conflict`, everything else to `Database`.
    pub(crate) fn from_unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
