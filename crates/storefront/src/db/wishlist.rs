//! Wishlist repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use retro_vault_core::{GameId, UserId, WishlistItemId};

use super::RepositoryError;
use super::catalog::GameSummaryRow;
use crate::models::wishlist::WishlistEntry;

#[derive(sqlx::FromRow)]
struct WishlistRow {
    wishlist_id: WishlistItemId,
    added_at: DateTime<Utc>,
    #[sqlx(flatten)]
    game: GameSummaryRow,
}

/// Repository for wishlist operations.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's saved games, most recently added first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, WishlistRow>(concat!(
            game_summary_select!(),
            r",
               w.id AS wishlist_id, w.created_at AS added_at
            FROM wishlist_items w
            JOIN games g ON g.id = w.game_id
            JOIN consoles c ON c.id = g.console_id
            WHERE w.user_id = $1
            ORDER BY w.created_at DESC, w.id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| WishlistEntry {
                id: r.wishlist_id,
                game: r.game.into(),
                added_at: r.added_at,
            })
            .collect())
    }

    /// Save a game. Saving it again is a no-op.
    ///
    /// # Returns
    ///
    /// Returns `true` if the game was newly added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the game doesn't exist.
    pub async fn add(&self, user_id: UserId, game_id: GameId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO wishlist_items (user_id, game_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, game_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(game_id)
        .execute(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a saved game.
    ///
    /// # Returns
    ///
    /// Returns `true` if the game was on the wishlist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, game_id: GameId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND game_id = $2")
            .bind(user_id)
            .bind(game_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
