//! Back-office repository: dashboard numbers, stock and reference-guarded deletes.

use rust_decimal::Decimal;
use sqlx::PgPool;

use retro_vault_core::{CategoryId, ConsoleId, GameId, OrderStatus};

use super::RepositoryError;
use crate::models::admin::{Dashboard, LowStockGame};

/// Games at or below this stock level show on the dashboard.
pub const LOW_STOCK_THRESHOLD: i32 = 3;

/// Repository for admin-only operations.
pub struct AdminRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminRepository<'a> {
    /// Create a new admin repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Collect dashboard counters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn dashboard(&self) -> Result<Dashboard, RepositoryError> {
        let counts = sqlx::query_as::<_, (OrderStatus, i64)>(
            "SELECT status, COUNT(*) FROM orders GROUP BY status",
        )
        .fetch_all(self.pool)
        .await?;

        let paid: Vec<OrderStatus> = OrderStatus::ALL
            .into_iter()
            .filter(|s| s.is_paid())
            .collect();

        let revenue = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(total), 0) FROM orders WHERE status = ANY($1)",
        )
        .bind(&paid)
        .fetch_one(self.pool)
        .await?;

        let user_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;

        let game_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM games")
            .fetch_one(self.pool)
            .await?;

        let low_stock = sqlx::query_as::<_, LowStockGame>(
            r"
            SELECT id, title, slug, stock
            FROM games
            WHERE stock <= $1
            ORDER BY stock, title
            LIMIT 20
            ",
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_all(self.pool)
        .await?;

        Ok(Dashboard {
            orders_by_status: Dashboard::status_counts(counts),
            revenue,
            user_count,
            game_count,
            low_stock,
        })
    }

    /// Set a game's stock level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the game doesn't exist.
    pub async fn set_stock(&self, id: GameId, stock: i32) -> Result<LowStockGame, RepositoryError> {
        sqlx::query_as::<_, LowStockGame>(
            r"
            UPDATE games SET stock = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, slug, stock
            ",
        )
        .bind(id)
        .bind(stock)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a console that no game references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if games still reference it.
    /// Returns `RepositoryError::NotFound` if the console doesn't exist.
    pub async fn delete_console(&self, id: ConsoleId) -> Result<(), RepositoryError> {
        let games = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM games WHERE console_id = $1")
            .bind(id)
            .fetch_one(self.pool)
            .await?;

        if games > 0 {
            return Err(RepositoryError::Conflict(format!(
                "console is used by {games} game(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM consoles WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(map_restrict)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Delete a category that no game references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if games still reference it.
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let games = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM game_categories WHERE category_id = $1",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        if games > 0 {
            return Err(RepositoryError::Conflict(format!(
                "category is used by {games} game(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(map_restrict)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

/// A game inserted between the count and the delete trips `ON DELETE RESTRICT`.
fn map_restrict(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db) = err
        && db.is_foreign_key_violation()
    {
        return RepositoryError::Conflict("still referenced by games".to_owned());
    }
    RepositoryError::Database(err)
}
