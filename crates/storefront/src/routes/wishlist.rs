//! Wishlist route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use retro_vault_core::GameId;

use super::JsonBody;
use crate::db::WishlistRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::wishlist::WishlistEntry;
use crate::state::AppState;

/// `POST /api/wishlist` body.
#[derive(Debug, Deserialize)]
pub struct WishlistRequest {
    pub game_id: GameId,
}

/// Saved games, most recent first.
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<WishlistEntry>>, AppError> {
    Ok(Json(WishlistRepository::new(state.pool()).list(user.id).await?))
}

/// Save a game. Saving it twice is a no-op answered with 200 instead of 201.
///
/// # Errors
///
/// 404 if the game doesn't exist.
pub async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<WishlistRequest>,
) -> Result<(StatusCode, Json<Vec<WishlistEntry>>), AppError> {
    let wishlist = WishlistRepository::new(state.pool());
    let added = wishlist.add(user.id, body.game_id).await?;

    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(wishlist.list(user.id).await?)))
}

/// Unsave a game.
///
/// # Errors
///
/// 404 if the game wasn't saved.
pub async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
) -> Result<StatusCode, AppError> {
    if !WishlistRepository::new(state.pool())
        .remove(user.id, game_id)
        .await?
    {
        return Err(AppError::NotFound("Game is not on your wishlist".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
