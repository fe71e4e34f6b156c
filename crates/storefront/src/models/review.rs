//! Review domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use retro_vault_core::{GameId, ReviewId, UserId};

/// A published review with vote tallies.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub author_name: String,
    pub game_id: GameId,
    pub rating: i32,
    pub title: String,
    pub body: String,
    pub verified_purchase: bool,
    pub helpful_count: i64,
    pub unhelpful_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Validated review submission.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub rating: i32,
    pub title: String,
    pub body: String,
}
