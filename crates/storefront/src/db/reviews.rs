//! Review repository.

use sqlx::PgPool;

use retro_vault_core::{GameId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::PageParams;
use crate::models::review::{NewReview, Review};

macro_rules! review_select {
    () => {
        r"
        SELECT r.id, r.user_id, u.name AS author_name, r.game_id, r.rating, r.title, r.body,
               r.verified_purchase,
               COUNT(v.id) FILTER (WHERE v.is_helpful) AS helpful_count,
               COUNT(v.id) FILTER (WHERE NOT v.is_helpful) AS unhelpful_count,
               r.created_at
        FROM reviews r
        JOIN users u ON u.id = r.user_id
        LEFT JOIN review_votes v ON v.review_id = r.id
        "
    };
}

/// Repository for reviews and helpfulness votes.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews for a game, most helpful first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_game(
        &self,
        game_id: GameId,
        page: PageParams,
    ) -> Result<(Vec<Review>, i64), RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(concat!(
            review_select!(),
            r"
            WHERE r.game_id = $1
            GROUP BY r.id, u.name
            ORDER BY helpful_count DESC, r.created_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(game_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE game_id = $1")
            .bind(game_id)
            .fetch_one(self.pool)
            .await?;

        Ok((reviews, total))
    }

    /// A single review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let review = sqlx::query_as::<_, Review>(concat!(
            review_select!(),
            "WHERE r.id = $1 GROUP BY r.id, u.name"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(review)
    }

    /// Publish a review.
    ///
    /// `verified_purchase` is set when the author has a non-cancelled order
    /// containing the game.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the game.
    pub async fn create(
        &self,
        user_id: UserId,
        game_id: GameId,
        review: &NewReview,
    ) -> Result<Review, RepositoryError> {
        let id = sqlx::query_scalar::<_, ReviewId>(
            r"
            INSERT INTO reviews (user_id, game_id, rating, title, body, verified_purchase)
            VALUES ($1, $2, $3, $4, $5, EXISTS (
                SELECT 1
                FROM order_items oi
                JOIN orders o ON o.id = oi.order_id
                WHERE o.user_id = $1 AND oi.game_id = $2 AND o.status <> 'cancelled'
            ))
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(game_id)
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.body)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "you have already reviewed this game"))?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a review.
    ///
    /// # Returns
    ///
    /// Returns `true` if the review existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ReviewId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a helpfulness vote, replacing the user's earlier vote.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    pub async fn vote(
        &self,
        review_id: ReviewId,
        user_id: UserId,
        helpful: bool,
    ) -> Result<Review, RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO review_votes (review_id, user_id, is_helpful)
            VALUES ($1, $2, $3)
            ON CONFLICT (review_id, user_id) DO UPDATE SET is_helpful = EXCLUDED.is_helpful
            ",
        )
        .bind(review_id)
        .bind(user_id)
        .bind(helpful)
        .execute(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;

        self.get(review_id).await?.ok_or(RepositoryError::NotFound)
    }
}
