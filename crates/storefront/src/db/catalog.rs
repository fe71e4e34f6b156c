//! Catalog repository: games, consoles and categories.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use retro_vault_core::{ConsoleId, GameId};

use super::RepositoryError;
use crate::models::PageParams;
use crate::models::catalog::{
    Category, CategoryRef, Console, GameDetail, GameImage, GameStock, GameSummary, RatingSummary,
};

/// Row decoded from the `game_summary_select!` columns.
#[derive(sqlx::FromRow)]
pub(super) struct GameSummaryRow {
    id: GameId,
    title: String,
    slug: String,
    console_id: ConsoleId,
    console_name: String,
    price: Decimal,
    sale_price: Option<Decimal>,
    stock: i32,
    condition: String,
    is_featured: bool,
    image_url: Option<String>,
}

impl From<GameSummaryRow> for GameSummary {
    fn from(r: GameSummaryRow) -> Self {
        Self::new(
            r.id,
            r.title,
            r.slug,
            r.console_id,
            r.console_name,
            r.price,
            r.sale_price,
            r.stock,
            r.condition,
            r.is_featured,
            r.image_url,
        )
    }
}

#[derive(sqlx::FromRow)]
struct GameDetailRow {
    #[sqlx(flatten)]
    summary: GameSummaryRow,
    description: String,
    publisher: Option<String>,
    release_year: Option<i32>,
    created_at: DateTime<Utc>,
}

/// Repository for read-mostly catalog queries.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List games, newest first, with the total count for pagination.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_games(
        &self,
        page: PageParams,
    ) -> Result<(Vec<GameSummary>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, GameSummaryRow>(concat!(
            game_summary_select!(),
            r"
            FROM games g
            JOIN consoles c ON c.id = g.console_id
            ORDER BY g.created_at DESC, g.id DESC
            LIMIT $1 OFFSET $2
            "
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM games")
            .fetch_one(self.pool)
            .await?;

        Ok((rows.into_iter().map(GameSummary::from).collect(), total))
    }

    /// Featured games, in-stock ones first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn featured(&self, limit: i64) -> Result<Vec<GameSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, GameSummaryRow>(concat!(
            game_summary_select!(),
            r"
            FROM games g
            JOIN consoles c ON c.id = g.console_id
            WHERE g.is_featured
            ORDER BY (g.stock > 0) DESC, g.created_at DESC
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(GameSummary::from).collect())
    }

    /// Full game page by slug, or `None` if no game has that slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<GameDetail>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, GameDetailRow>(concat!(
            game_summary_select!(),
            r",
               g.description, g.publisher, g.release_year, g.created_at
            FROM games g
            JOIN consoles c ON c.id = g.console_id
            WHERE g.slug = $1
            "
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let game_id = row.summary.id;

        let categories = sqlx::query_as::<_, CategoryRef>(
            r"
            SELECT c.id, c.name, c.slug
            FROM categories c
            JOIN game_categories gc ON gc.category_id = c.id
            WHERE gc.game_id = $1
            ORDER BY c.name
            ",
        )
        .bind(game_id)
        .fetch_all(self.pool)
        .await?;

        let images = sqlx::query_as::<_, GameImage>(
            r"
            SELECT id, url, alt_text, is_primary, sort_order
            FROM game_images
            WHERE game_id = $1
            ORDER BY is_primary DESC, sort_order, id
            ",
        )
        .bind(game_id)
        .fetch_all(self.pool)
        .await?;

        let rating = self.rating_summary(game_id).await?;

        Ok(Some(GameDetail {
            summary: row.summary.into(),
            description: row.description,
            publisher: row.publisher,
            release_year: row.release_year,
            categories,
            images,
            rating,
            created_at: row.created_at,
        }))
    }

    /// Resolve a slug to a game ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn game_id_by_slug(&self, slug: &str) -> Result<Option<GameId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, GameId>("SELECT id FROM games WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;

        Ok(id)
    }

    /// Average rating and review count for a game.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rating_summary(&self, game_id: GameId) -> Result<RatingSummary, RepositoryError> {
        let (average, count) = sqlx::query_as::<_, (Option<f64>, i64)>(
            "SELECT AVG(rating)::FLOAT8, COUNT(*) FROM reviews WHERE game_id = $1",
        )
        .bind(game_id)
        .fetch_one(self.pool)
        .await?;

        Ok(RatingSummary {
            average: average.map(|avg| (avg * 10.0).round() / 10.0),
            count,
        })
    }

    /// Price and stock of a single game.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_stock(&self, id: GameId) -> Result<Option<GameStock>, RepositoryError> {
        let game = sqlx::query_as::<_, GameStock>(
            "SELECT id, title, price, sale_price, stock FROM games WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(game)
    }

    /// All consoles with the number of games on each.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_consoles(&self) -> Result<Vec<Console>, RepositoryError> {
        let consoles = sqlx::query_as::<_, Console>(
            r"
            SELECT c.id, c.name, c.slug, c.manufacturer, c.release_year,
                   COUNT(g.id) AS game_count
            FROM consoles c
            LEFT JOIN games g ON g.console_id = c.id
            GROUP BY c.id
            ORDER BY c.manufacturer, c.release_year NULLS LAST, c.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(consoles)
    }

    /// All categories with the number of games in each.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            r"
            SELECT c.id, c.name, c.slug, c.description,
                   COUNT(gc.game_id) AS game_count
            FROM categories c
            LEFT JOIN game_categories gc ON gc.category_id = c.id
            GROUP BY c.id
            ORDER BY c.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }
}
