//! Wishlist domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use retro_vault_core::WishlistItemId;

use super::catalog::GameSummary;

/// A saved game.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistEntry {
    pub id: WishlistItemId,
    pub game: GameSummary,
    pub added_at: DateTime<Utc>,
}
