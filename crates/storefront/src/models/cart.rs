//! Cart domain types.

use rust_decimal::Decimal;
use serde::Serialize;

use retro_vault_core::{CartItemId, GameId, money};

/// One cart row joined with its game.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub game_id: GameId,
    pub title: String,
    pub slug: String,
    pub console_name: String,
    pub quantity: i32,
    /// Price captured when the line was added or last updated.
    pub unit_price: Decimal,
    /// Price the game sells for right now.
    pub current_price: Decimal,
    pub stock: i32,
    pub line_total: Decimal,
    pub image_url: Option<String>,
}

impl CartLine {
    /// Whether the game can still cover this line's quantity.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.quantity <= self.stock
    }
}

/// A user's cart.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: Decimal,
}

impl Cart {
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let item_count = lines.iter().map(|l| i64::from(l.quantity)).sum();
        let subtotal = lines.iter().map(|l| l.line_total).sum();
        Self {
            lines,
            item_count,
            subtotal,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub(crate) fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    money::line_total(unit_price, quantity)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn line(id: i32, game_id: i32, quantity: i32, price: Decimal, stock: i32) -> CartLine {
        CartLine {
            id: CartItemId::new(id),
            game_id: GameId::new(game_id),
            title: format!("Game {game_id}"),
            slug: format!("game-{game_id}"),
            console_name: "Super Nintendo".to_string(),
            quantity,
            unit_price: price,
            current_price: price,
            stock,
            line_total: line_total(price, quantity),
            image_url: None,
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::from_lines(vec![
            line(1, 10, 2, Decimal::new(1999, 2), 5),
            line(2, 11, 1, Decimal::new(4500, 2), 1),
        ]);
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.subtotal, Decimal::new(8498, 2));
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::from_lines(Vec::new());
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal, Decimal::ZERO);
    }

    #[test]
    fn test_line_availability() {
        assert!(line(1, 10, 2, Decimal::ONE, 2).is_available());
        assert!(!line(1, 10, 3, Decimal::ONE, 2).is_available());
    }
}
