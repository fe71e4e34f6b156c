//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use retro_vault_core::{
    GameId, OrderId, OrderItemId, OrderStatus, PaymentMethod, ShippingAddress, UserId,
};

/// A placed order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_id: String,
    pub shipping_address: ShippingAddress,
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of a placed order, priced at purchase time.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    /// `None` once the game has been removed from the catalog.
    pub game_id: Option<GameId>,
    pub title: String,
    pub quantity: i32,
    pub price: Decimal,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        retro_vault_core::money::line_total(self.price, self.quantity)
    }
}

/// An order together with its items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Line to insert when placing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub game_id: GameId,
    pub title: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// Order to insert once payment has been confirmed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_id: String,
    pub shipping_address: ShippingAddress,
    pub items: Vec<NewOrderItem>,
}

/// Shipping fields an admin may set alongside a status change.
#[derive(Debug, Clone, Default)]
pub struct ShippingUpdate {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}
