//! Back-office route handlers.
//!
//! Every handler takes [`RequireAdmin`], which re-reads the role from the
//! database on each request.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use retro_vault_core::{CategoryId, ConsoleId, GameId, OrderId, OrderStatus, Role, UserId};

use super::JsonBody;
use crate::db::{AdminRepository, OrderRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::admin::{Dashboard, LowStockGame};
use crate::models::order::{Order, OrderDetail, ShippingUpdate};
use crate::models::user::User;
use crate::models::{Page, PageParams};
use crate::state::AppState;

const MAX_SHIPPING_FIELD_LENGTH: usize = 100;

// =============================================================================
// Request Types
// =============================================================================

/// `GET /api/admin/orders` query.
///
/// Page fields are spelled out because `serde(flatten)` loses number parsing
/// in query strings.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// `PATCH /api/admin/orders/{id}` body.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: OrderStatus,
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
}

/// `PUT /api/admin/games/{id}/stock` body.
#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub stock: i32,
}

/// `PUT /api/admin/users/{id}/role` body.
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

fn shipping_field(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    let Some(value) = value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if value.chars().count() > MAX_SHIPPING_FIELD_LENGTH {
        return Err(AppError::Validation {
            message: "invalid shipping details".to_owned(),
            fields: [(
                field.to_owned(),
                format!("{field} must be at most {MAX_SHIPPING_FIELD_LENGTH} characters"),
            )]
            .into(),
        });
    }

    Ok(Some(value))
}

impl UpdateOrderRequest {
    fn shipping(self) -> Result<ShippingUpdate, AppError> {
        Ok(ShippingUpdate {
            carrier: shipping_field("shipping_carrier", self.shipping_carrier)?,
            tracking_number: shipping_field("tracking_number", self.tracking_number)?,
        })
    }
}

/// Email the customer that their order shipped, if they want order updates.
async fn notify_shipped(state: &AppState, order: Order) {
    let Some(mailer) = state.email().cloned() else {
        return;
    };
    let Some(user_id) = order.user_id else {
        return;
    };

    let user = match UserRepository::new(state.pool()).get_by_id(user_id).await {
        Ok(Some(user)) if user.settings.order_updates => user,
        Ok(_) => return,
        Err(e) => {
            tracing::warn!(error = %e, order_id = %order.id, "Could not load customer for shipping email");
            return;
        }
    };

    tokio::spawn(async move {
        if let Err(e) = mailer
            .send_shipping_notice(user.email.as_str(), &user.name, &order)
            .await
        {
            tracing::warn!(error = %e, order_id = %order.id, "Failed to send shipping email");
        }
    });
}

// =============================================================================
// Handlers
// =============================================================================

/// Order counts, revenue, user count and low-stock games.
///
/// # Errors
///
/// 500 if a query fails.
pub async fn dashboard(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Dashboard>, AppError> {
    Ok(Json(AdminRepository::new(state.pool()).dashboard().await?))
}

/// All orders, optionally filtered by status.
///
/// # Errors
///
/// 400 for an unknown status.
pub async fn orders(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Page<Order>>, AppError> {
    let params = PageParams {
        page: query.page,
        per_page: query.per_page,
    };

    let (orders, total) = OrderRepository::new(state.pool())
        .list(query.status, params)
        .await?;

    Ok(Json(Page::new(orders, params, total)))
}

/// Any order with its items.
///
/// # Errors
///
/// 404 if the order doesn't exist.
pub async fn order(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// Move an order along the status table, optionally recording shipping details.
///
/// # Errors
///
/// 404 if the order doesn't exist, 409 if the transition isn't allowed.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, next = %body.status))]
pub async fn update_order(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    JsonBody(body): JsonBody<UpdateOrderRequest>,
) -> Result<Json<OrderDetail>, AppError> {
    let next = body.status;
    let shipping = body.shipping()?;
    let orders = OrderRepository::new(state.pool());

    let order = orders.transition(id, next, &shipping, None).await?;

    if next == OrderStatus::Shipped {
        notify_shipped(&state, order).await;
    }

    orders
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// Set a game's stock level.
///
/// # Errors
///
/// 400 for negative stock, 404 if the game doesn't exist.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_stock(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<GameId>,
    JsonBody(body): JsonBody<StockRequest>,
) -> Result<Json<LowStockGame>, AppError> {
    if body.stock < 0 {
        return Err(AppError::Validation {
            message: "invalid stock".to_owned(),
            fields: [("stock".to_owned(), "stock cannot be negative".to_owned())].into(),
        });
    }

    let game = AdminRepository::new(state.pool())
        .set_stock(id, body.stock)
        .await?;

    tracing::info!(game_id = %id, stock = body.stock, "Stock set");
    Ok(Json(game))
}

/// Delete a console no game uses.
///
/// # Errors
///
/// 404 if it doesn't exist, 409 while games reference it.
pub async fn delete_console(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ConsoleId>,
) -> Result<StatusCode, AppError> {
    AdminRepository::new(state.pool()).delete_console(id).await?;
    tracing::info!(console_id = %id, "Console deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a category no game uses.
///
/// # Errors
///
/// 404 if it doesn't exist, 409 while games reference it.
pub async fn delete_category(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, AppError> {
    AdminRepository::new(state.pool())
        .delete_category(id)
        .await?;
    tracing::info!(category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Change a user's role. Admins can't change their own.
///
/// # Errors
///
/// 400 for the caller's own account, 404 if the user doesn't exist.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    JsonBody(body): JsonBody<RoleRequest>,
) -> Result<Json<User>, AppError> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot change your own role".to_string(),
        ));
    }

    let user = UserRepository::new(state.pool())
        .set_role(id, body.role)
        .await?;

    tracing::info!(user_id = %id, role = %body.role, "Role changed");
    Ok(Json(user))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_blank_shipping_fields_are_ignored() {
        let body: UpdateOrderRequest = serde_json::from_str(
            r#"{"status": "shipped", "shipping_carrier": " UPS ", "tracking_number": ""}"#,
        )
        .unwrap();
        assert_eq!(body.status, OrderStatus::Shipped);

        let shipping = body.shipping().unwrap();
        assert_eq!(shipping.carrier.as_deref(), Some("UPS"));
        assert_eq!(shipping.tracking_number, None);
    }

    #[test]
    fn test_update_request_rejects_long_tracking_number() {
        let body = UpdateOrderRequest {
            status: OrderStatus::Shipped,
            shipping_carrier: None,
            tracking_number: Some("1Z".repeat(MAX_SHIPPING_FIELD_LENGTH)),
        };
        assert!(matches!(
            body.shipping(),
            Err(AppError::Validation { fields, .. }) if fields.contains_key("tracking_number")
        ));
    }

    #[test]
    fn test_orders_query_parses_status_and_page() {
        let query: OrdersQuery =
            serde_json::from_str(r#"{"status": "processing", "page": 2}"#).unwrap();
        assert_eq!(query.status, Some(OrderStatus::Processing));
        assert_eq!(query.page, Some(2));
    }
}
