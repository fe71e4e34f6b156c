//! Catalog domain types: games, consoles, categories and images.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use retro_vault_core::{CategoryId, ConsoleId, GameId, GameImageId, money};

/// A console platform.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Console {
    pub id: ConsoleId,
    pub name: String,
    pub slug: String,
    pub manufacturer: String,
    pub release_year: Option<i32>,
    pub game_count: i64,
}

/// A game category (genre).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub game_count: i64,
}

/// Category reference embedded in a game detail.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// A product image.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GameImage {
    pub id: GameImageId,
    pub url: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
    pub sort_order: i32,
}

/// Game as shown in listings.
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub id: GameId,
    pub title: String,
    pub slug: String,
    pub console_id: ConsoleId,
    pub console_name: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub effective_price: Decimal,
    pub on_sale: bool,
    pub stock: i32,
    pub in_stock: bool,
    pub condition: String,
    pub is_featured: bool,
    pub image_url: Option<String>,
}

impl GameSummary {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
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
    ) -> Self {
        let effective_price = money::effective_price(price, sale_price);
        Self {
            id,
            title,
            slug,
            console_id,
            console_name,
            price,
            sale_price,
            effective_price,
            on_sale: effective_price < price,
            stock,
            in_stock: stock > 0,
            condition,
            is_featured,
            image_url,
        }
    }
}

/// Average rating and review count.
#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i64,
}

/// Full game page.
#[derive(Debug, Clone, Serialize)]
pub struct GameDetail {
    #[serde(flatten)]
    pub summary: GameSummary,
    pub description: String,
    pub publisher: Option<String>,
    pub release_year: Option<i32>,
    pub categories: Vec<CategoryRef>,
    pub images: Vec<GameImage>,
    pub rating: RatingSummary,
    pub created_at: DateTime<Utc>,
}

/// Game fields needed to price and validate a cart line.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GameStock {
    pub id: GameId,
    pub title: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock: i32,
}

impl GameStock {
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        money::effective_price(self.price, self.sale_price)
    }
}
