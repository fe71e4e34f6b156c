//! Cart route handlers.
//!
//! Carts are rows keyed by user, so every handler requires a login. Adds and
//! quantity changes are checked against stock by [`CartService`].

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use retro_vault_core::{CartItemId, GameId};

use super::JsonBody;
use crate::db::CartRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::models::cart::Cart;
use crate::services::cart::{CartService, CartUpdate};
use crate::state::AppState;

/// `POST /api/cart` body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub game_id: GameId,
    #[serde(default = "one")]
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

/// `PATCH /api/cart/{id}` body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub quantity: i32,
}

/// Units in the cart.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: i64,
}

async fn load_cart(state: &AppState, user: &CurrentUser) -> Result<Cart, AppError> {
    let lines = CartRepository::new(state.pool()).lines(user.id).await?;
    Ok(Cart::from_lines(lines))
}

/// The user's cart.
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Cart>, AppError> {
    Ok(Json(load_cart(&state, &user).await?))
}

/// Units in the user's cart.
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn count(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<CartCount>, AppError> {
    let count = CartRepository::new(state.pool()).count(user.id).await?;
    Ok(Json(CartCount { count }))
}

/// Add a game to the cart and return the updated cart.
///
/// # Errors
///
/// 400 for a bad quantity, 404 for an unknown game, 409 if stock is short.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<AddToCartRequest>,
) -> Result<(StatusCode, Json<Cart>), AppError> {
    CartService::new(state.pool())
        .add(user.id, body.game_id, body.quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(load_cart(&state, &user).await?)))
}

/// Change a line's quantity; zero removes it.
///
/// # Errors
///
/// 400 for a bad quantity, 404 if the line isn't the user's, 409 if stock is short.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<CartItemId>,
    JsonBody(body): JsonBody<UpdateCartRequest>,
) -> Result<Json<Cart>, AppError> {
    let outcome = CartService::new(state.pool())
        .update(user.id, id, body.quantity)
        .await?;

    if outcome == CartUpdate::Removed {
        tracing::debug!(item_id = %id, "Cart line removed by zero quantity");
    }

    Ok(Json(load_cart(&state, &user).await?))
}

/// Remove a line.
///
/// # Errors
///
/// 404 if the line isn't the user's.
pub async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<CartItemId>,
) -> Result<Json<Cart>, AppError> {
    if !CartRepository::new(state.pool()).remove(user.id, id).await? {
        return Err(AppError::NotFound("Cart item not found".to_string()));
    }

    Ok(Json(load_cart(&state, &user).await?))
}

/// Empty the cart.
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn clear(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_defaults_to_one() {
        let body: AddToCartRequest = serde_json::from_str(r#"{"game_id": 4}"#).unwrap();
        assert_eq!(body.game_id, GameId::new(4));
        assert_eq!(body.quantity, 1);
    }
}
