//! Cart repository.
//!
//! Cart rows are keyed by `(user_id, game_id)`; adding a game that is
//! already in the cart merges quantities instead of inserting a new row.

use rust_decimal::Decimal;
use sqlx::PgPool;

use retro_vault_core::{CartItemId, GameId, UserId, money};

use super::RepositoryError;
use crate::models::cart::{CartLine, line_total};

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartItemId,
    game_id: GameId,
    title: String,
    slug: String,
    console_name: String,
    quantity: i32,
    unit_price: Decimal,
    price: Decimal,
    sale_price: Option<Decimal>,
    stock: i32,
    image_url: Option<String>,
}

impl From<CartLineRow> for CartLine {
    fn from(r: CartLineRow) -> Self {
        let current_price = money::effective_price(r.price, r.sale_price);
        Self {
            id: r.id,
            game_id: r.game_id,
            title: r.title,
            slug: r.slug,
            console_name: r.console_name,
            quantity: r.quantity,
            unit_price: r.unit_price,
            current_price,
            stock: r.stock,
            line_total: line_total(current_price, r.quantity),
            image_url: r.image_url,
        }
    }
}

/// A cart row without its game join.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct CartItem {
    pub id: CartItemId,
    pub game_id: GameId,
    pub quantity: i32,
}

/// Repository for cart operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All lines in a user's cart, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.id, ci.game_id, g.title, g.slug, c.name AS console_name,
                   ci.quantity, ci.price AS unit_price, g.price, g.sale_price, g.stock,
                   (SELECT i.url FROM game_images i
                    WHERE i.game_id = g.id
                    ORDER BY i.is_primary DESC, i.sort_order, i.id
                    LIMIT 1) AS image_url
            FROM cart_items ci
            JOIN games g ON g.id = ci.game_id
            JOIN consoles c ON c.id = g.console_id
            WHERE ci.user_id = $1
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    /// Total number of units in a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM cart_items WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// A single cart row owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_item(
        &self,
        user_id: UserId,
        id: CartItemId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let item = sqlx::query_as::<_, CartItem>(
            "SELECT id, game_id, quantity FROM cart_items WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(item)
    }

    /// Quantity of `game_id` already in the cart, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        user_id: UserId,
        game_id: GameId,
    ) -> Result<Option<i32>, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM cart_items WHERE user_id = $1 AND game_id = $2",
        )
        .bind(user_id)
        .bind(game_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(quantity)
    }

    /// Add `quantity` units of a game, merging into an existing line.
    ///
    /// The price snapshot is replaced with `unit_price` either way.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(
        &self,
        user_id: UserId,
        game_id: GameId,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<CartItem, RepositoryError> {
        let item = sqlx::query_as::<_, CartItem>(
            r"
            INSERT INTO cart_items (user_id, game_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, game_id) DO UPDATE
            SET quantity = cart_items.quantity + EXCLUDED.quantity,
                price = EXCLUDED.price,
                updated_at = NOW()
            RETURNING id, game_id, quantity
            ",
        )
        .bind(user_id)
        .bind(game_id)
        .bind(quantity)
        .bind(unit_price)
        .fetch_one(self.pool)
        .await?;

        Ok(item)
    }

    /// Set a line's quantity and refresh its price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line doesn't belong to the user.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cart_items
            SET quantity = $3, price = $4, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(quantity)
        .bind(unit_price)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Remove a line.
    ///
    /// # Returns
    ///
    /// Returns `true` if a line was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, id: CartItemId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Empty a user's cart, returning the number of lines removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
