//! Order repository.
//!
//! Placing an order is a single transaction: the games being bought are
//! locked in id order, stock is decremented only if it still covers the
//! quantity, and the purchased cart rows are deleted. An order is unique per
//! `(payment_method, payment_id)` so a provider payment can only ever be
//! turned into one order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use retro_vault_core::{OrderId, OrderStatus, PaymentMethod, ShippingAddress, UserId};

use super::RepositoryError;
use crate::models::PageParams;
use crate::models::catalog::GameStock;
use crate::models::order::{NewOrder, Order, OrderDetail, OrderItem, ShippingUpdate};

macro_rules! order_select {
    () => {
        r"
        SELECT id, user_id, subtotal, shipping_cost, total, status, payment_method,
               payment_id, shipping_address, shipping_carrier, tracking_number,
               shipped_at, delivered_at, created_at, updated_at
        FROM orders
        "
    };
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: Option<UserId>,
    subtotal: Decimal,
    shipping_cost: Decimal,
    total: Decimal,
    status: OrderStatus,
    payment_method: PaymentMethod,
    payment_id: String,
    shipping_address: Json<ShippingAddress>,
    shipping_carrier: Option<String>,
    tracking_number: Option<String>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            subtotal: r.subtotal,
            shipping_cost: r.shipping_cost,
            total: r.total,
            status: r.status,
            payment_method: r.payment_method,
            payment_id: r.payment_id,
            shipping_address: r.shipping_address.0,
            shipping_carrier: r.shipping_carrier,
            tracking_number: r.tracking_number,
            shipped_at: r.shipped_at,
            delivered_at: r.delivered_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Result of [`OrderRepository::place`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOrder {
    /// A new order was written.
    Created(OrderId),
    /// The payment had already been turned into this order.
    Existing(OrderId),
    /// A game no longer has enough stock; nothing was written.
    OutOfStock {
        title: String,
        requested: i32,
        available: i32,
    },
}

/// Repository for order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Write a paid order, decrement stock and remove the bought cart rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a concurrent request placed an
    /// order for the same payment first.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, order), fields(payment_id = %order.payment_id, items = order.items.len()))]
    pub async fn place(&self, order: &NewOrder) -> Result<PlaceOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(existing) =
            find_by_payment(&mut tx, order.payment_method, &order.payment_id).await?
        {
            tx.rollback().await?;
            return Ok(PlaceOrder::Existing(existing));
        }

        let mut game_ids: Vec<i32> = order.items.iter().map(|i| i.game_id.as_i32()).collect();
        game_ids.sort_unstable();
        game_ids.dedup();

        let locked = sqlx::query_as::<_, GameStock>(
            r"
            SELECT id, title, price, sale_price, stock
            FROM games
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(&game_ids)
        .fetch_all(&mut *tx)
        .await?;

        for item in &order.items {
            let available = locked
                .iter()
                .find(|g| g.id == item.game_id)
                .map_or(0, |g| g.stock);

            if available < item.quantity {
                tx.rollback().await?;
                return Ok(PlaceOrder::OutOfStock {
                    title: item.title.clone(),
                    requested: item.quantity,
                    available,
                });
            }
        }

        let order_id = sqlx::query_scalar::<_, OrderId>(
            r"
            INSERT INTO orders (user_id, subtotal, shipping_cost, total, status,
                                payment_method, payment_id, shipping_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(order.user_id)
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.total)
        .bind(order.status)
        .bind(order.payment_method)
        .bind(&order.payment_id)
        .bind(Json(&order.shipping_address))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "order already placed for this payment"))?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, game_id, title, quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(order_id)
            .bind(item.game_id)
            .bind(&item.title)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;

            // Rows are locked, so this only fails if the check above was bypassed.
            let updated = sqlx::query(
                "UPDATE games SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2",
            )
            .bind(item.game_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(PlaceOrder::OutOfStock {
                    title: item.title.clone(),
                    requested: item.quantity,
                    available: 0,
                });
            }
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND game_id = ANY($2)")
            .bind(order.user_id)
            .bind(&game_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(order_id = %order_id, total = %order.total, "Order placed");
        Ok(PlaceOrder::Created(order_id))
    }

    /// Order placed for a provider payment, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_payment(
        &self,
        method: PaymentMethod,
        payment_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_by_payment(&mut conn, method, payment_id).await
    }

    /// An order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(concat!(order_select!(), "WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        let items = self.items(id).await?;
        Ok(Some(OrderDetail {
            order: row.into(),
            items,
        }))
    }

    /// An order with its items, only if `user_id` owns it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        Ok(self
            .get(id)
            .await?
            .filter(|detail| detail.order.user_id == Some(user_id)))
    }

    async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, game_id, title, quantity, price
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: PageParams,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(concat!(
            order_select!(),
            r"
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        Ok((rows.into_iter().map(Order::from).collect(), total))
    }

    /// All orders, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageParams,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(concat!(
            order_select!(),
            r"
            WHERE $1::order_status IS NULL OR status = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE $1::order_status IS NULL OR status = $1",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(Order::from).collect(), total))
    }

    /// Move an order to `next`, enforcing the status transition table.
    ///
    /// When `owner` is set the order must belong to that user. Entering
    /// `shipped` or `delivered` stamps the matching timestamp; entering
    /// `cancelled` returns every item to stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist (or isn't owned by `owner`).
    /// Returns `RepositoryError::Conflict` if the transition isn't allowed.
    #[instrument(skip(self, shipping), fields(order_id = %id, next = %next))]
    pub async fn transition(
        &self,
        id: OrderId,
        next: OrderStatus,
        shipping: &ShippingUpdate,
        owner: Option<UserId>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, (OrderStatus, Option<UserId>)>(
            "SELECT status, user_id FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let status = match current {
            Some((status, user_id)) if owner.is_none() || owner == user_id => status,
            _ => return Err(RepositoryError::NotFound),
        };

        if !status.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "cannot change order status from {status} to {next}"
            )));
        }

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE orders
            SET status = $2,
                shipping_carrier = COALESCE($3, shipping_carrier),
                tracking_number = COALESCE($4, tracking_number),
                shipped_at = CASE WHEN $2 = 'shipped'::order_status THEN NOW() ELSE shipped_at END,
                delivered_at = CASE WHEN $2 = 'delivered'::order_status THEN NOW() ELSE delivered_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, subtotal, shipping_cost, total, status, payment_method,
                      payment_id, shipping_address, shipping_carrier, tracking_number,
                      shipped_at, delivered_at, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(next)
        .bind(&shipping.carrier)
        .bind(&shipping.tracking_number)
        .fetch_one(&mut *tx)
        .await?;

        if next.restocks_on_entry() {
            let restocked = sqlx::query(
                r"
                UPDATE games g
                SET stock = g.stock + oi.quantity, updated_at = NOW()
                FROM order_items oi
                WHERE oi.order_id = $1 AND oi.game_id = g.id
                ",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;

            tracing::info!(games = restocked.rows_affected(), "Restocked cancelled order");
        }

        tx.commit().await?;

        tracing::info!(from = %status, to = %next, "Order status changed");
        Ok(row.into())
    }
}

async fn find_by_payment(
    conn: &mut PgConnection,
    method: PaymentMethod,
    payment_id: &str,
) -> Result<Option<OrderId>, RepositoryError> {
    let id = sqlx::query_scalar::<_, OrderId>(
        "SELECT id FROM orders WHERE payment_method = $1 AND payment_id = $2",
    )
    .bind(method)
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;

    Ok(id)
}
