//! Cart mutations that need stock checks.
//!
//! Reads go straight to [`CartRepository`]; adding and re-quantifying lines
//! go through here so the stock rule lives in one place.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use retro_vault_core::{CartItemId, GameId, UserId};

use crate::db::cart::CartItem;
use crate::db::{CartRepository, CatalogRepository, RepositoryError};

/// Largest quantity accepted for a single line.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Errors from cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("quantity must be between {min} and {MAX_LINE_QUANTITY}")]
    InvalidQuantity { min: i32 },

    #[error("game not found")]
    GameNotFound,

    #[error("cart item not found")]
    LineNotFound,

    #[error("only {available} of \"{title}\" in stock")]
    InsufficientStock { title: String, available: i32 },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of `CartService::update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartUpdate {
    Updated,
    Removed,
}

/// Cart mutation service.
pub struct CartService<'a> {
    cart: CartRepository<'a>,
    catalog: CatalogRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            cart: CartRepository::new(pool),
            catalog: CatalogRepository::new(pool),
        }
    }

    /// Add units of a game, merging with any existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if the added or merged quantity
    /// falls outside `1..=MAX_LINE_QUANTITY`, `CartError::GameNotFound` for
    /// an unknown game, `CartError::InsufficientStock` if the merged line
    /// would exceed stock.
    #[instrument(skip(self), fields(user_id = %user_id, game_id = %game_id))]
    pub async fn add(
        &self,
        user_id: UserId,
        game_id: GameId,
        quantity: i32,
    ) -> Result<CartItem, CartError> {
        check_range(quantity, 1)?;

        let game = self
            .catalog
            .get_stock(game_id)
            .await?
            .ok_or(CartError::GameNotFound)?;

        let existing = self.cart.quantity_of(user_id, game_id).await?.unwrap_or(0);
        let merged = merged_quantity(existing, quantity)?;
        check_stock(merged, game.stock, &game.title)?;

        Ok(self
            .cart
            .add(user_id, game_id, quantity, game.effective_price())
            .await?)
    }

    /// Set a line's quantity; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line isn't the user's,
    /// `CartError::InsufficientStock` if `quantity` exceeds stock.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %id))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartUpdate, CartError> {
        check_range(quantity, 0)?;

        if quantity == 0 {
            return if self.cart.remove(user_id, id).await? {
                Ok(CartUpdate::Removed)
            } else {
                Err(CartError::LineNotFound)
            };
        }

        let item = self
            .cart
            .get_item(user_id, id)
            .await?
            .ok_or(CartError::LineNotFound)?;

        let game = self
            .catalog
            .get_stock(item.game_id)
            .await?
            .ok_or(CartError::GameNotFound)?;

        check_stock(quantity, game.stock, &game.title)?;

        match self
            .cart
            .set_quantity(user_id, id, quantity, game.effective_price())
            .await
        {
            Ok(()) => Ok(CartUpdate::Updated),
            Err(RepositoryError::NotFound) => Err(CartError::LineNotFound),
            Err(e) => Err(e.into()),
        }
    }
}

const fn check_range(quantity: i32, min: i32) -> Result<(), CartError> {
    if quantity < min || quantity > MAX_LINE_QUANTITY {
        return Err(CartError::InvalidQuantity { min });
    }
    Ok(())
}

/// Line quantity after adding `added` to `existing`; the merged line obeys the same cap.
fn merged_quantity(existing: i32, added: i32) -> Result<i32, CartError> {
    let merged = existing.saturating_add(added);
    check_range(merged, 1)?;
    Ok(merged)
}

fn check_stock(requested: i32, stock: i32, title: &str) -> Result<(), CartError> {
    if requested > stock {
        return Err(CartError::InsufficientStock {
            title: title.to_owned(),
            available: stock,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_range() {
        assert!(check_range(1, 1).is_ok());
        assert!(check_range(MAX_LINE_QUANTITY, 1).is_ok());
        assert!(matches!(
            check_range(0, 1),
            Err(CartError::InvalidQuantity { min: 1 })
        ));
        assert!(check_range(-1, 0).is_err());
        assert!(check_range(MAX_LINE_QUANTITY + 1, 0).is_err());
        assert!(check_range(0, 0).is_ok());
    }

    #[test]
    fn test_merged_line_respects_cap() {
        assert_eq!(merged_quantity(0, 3).ok(), Some(3));
        assert_eq!(merged_quantity(60, 39).ok(), Some(MAX_LINE_QUANTITY));
        assert!(matches!(
            merged_quantity(60, 60),
            Err(CartError::InvalidQuantity { min: 1 })
        ));
        assert!(merged_quantity(i32::MAX, 1).is_err());
    }

    #[test]
    fn test_stock_check() {
        assert!(check_stock(2, 2, "EarthBound").is_ok());
        match check_stock(3, 2, "EarthBound") {
            Err(CartError::InsufficientStock { title, available }) => {
                assert_eq!(title, "EarthBound");
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CartError::InvalidQuantity { min: 1 }.to_string(),
            "quantity must be between 1 and 99"
        );
    }
}
