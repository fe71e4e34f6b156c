//! Account route handlers.
//!
//! These routes require authentication.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use retro_vault_core::{OrderId, OrderStatus, ShippingAddress};

use super::JsonBody;
use crate::db::{OrderRepository, UserRepository};
use crate::error::{AppError, clear_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user};
use crate::models::order::{Order, OrderDetail, ShippingUpdate};
use crate::models::user::{ProfileUpdate, User, UserSettingsPatch};
use crate::models::{Page, PageParams};
use crate::services::auth::{AuthService, validate_name};
use crate::state::AppState;

const MAX_PHONE_LENGTH: usize = 30;
const MAX_AVATAR_URL_LENGTH: usize = 500;
const MAX_BIO_LENGTH: usize = 1000;

// =============================================================================
// Request Types
// =============================================================================

/// `PATCH /api/account/profile` body. Absent fields keep their current value;
/// an empty string clears an optional field.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    /// `null` clears the saved address.
    #[serde(default, deserialize_with = "double_option")]
    pub default_shipping_address: Option<Option<ShippingAddress>>,
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// `PUT /api/account/password` body.
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// `DELETE /api/account` body.
#[derive(Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

impl std::fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChangePasswordRequest { .. }")
    }
}

impl std::fmt::Debug for DeleteAccountRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DeleteAccountRequest { .. }")
    }
}

/// Trim an optional text field; blank means cleared.
fn optional_text(
    errors: &mut BTreeMap<String, String>,
    field: &str,
    value: Option<String>,
    current: Option<String>,
    max: usize,
) -> Option<String> {
    let Some(value) = value else {
        return current;
    };

    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.chars().count() > max {
        errors.insert(
            field.to_owned(),
            format!("{field} must be at most {max} characters"),
        );
    }
    Some(value.to_owned())
}

impl ProfileRequest {
    /// Merge onto the current profile, collecting every invalid field.
    fn merge(self, current: User) -> Result<ProfileUpdate, AppError> {
        let mut errors = BTreeMap::new();

        let name = match self.name {
            Some(name) => validate_name(&name).unwrap_or_else(|e| {
                errors.insert("name".to_owned(), e.to_string());
                String::new()
            }),
            None => current.name,
        };

        let phone = optional_text(
            &mut errors,
            "phone",
            self.phone,
            current.phone,
            MAX_PHONE_LENGTH,
        );
        let avatar_url = optional_text(
            &mut errors,
            "avatar_url",
            self.avatar_url,
            current.avatar_url,
            MAX_AVATAR_URL_LENGTH,
        );
        if let Some(url) = &avatar_url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            errors.insert(
                "avatar_url".to_owned(),
                "avatar_url must be an http(s) URL".to_owned(),
            );
        }
        let bio = optional_text(&mut errors, "bio", self.bio, current.bio, MAX_BIO_LENGTH);

        let default_shipping_address = match self.default_shipping_address {
            None => current.default_shipping_address,
            Some(None) => None,
            Some(Some(address)) => match address.validate() {
                Ok(address) => Some(address),
                Err(e) => {
                    for (field, message) in e.0 {
                        errors.insert(format!("default_shipping_address.{field}"), message);
                    }
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(AppError::Validation {
                message: "invalid profile".to_owned(),
                fields: errors,
            });
        }

        Ok(ProfileUpdate {
            name,
            phone,
            avatar_url,
            bio,
            default_shipping_address,
        })
    }
}

// =============================================================================
// Profile & Settings
// =============================================================================

/// The user's profile.
///
/// # Errors
///
/// 401 if the account no longer exists.
pub async fn profile(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    Ok(Json(AuthService::new(state.pool()).get_user(user.id).await?))
}

/// Update profile fields.
///
/// # Errors
///
/// 400 with per-field messages if any field is invalid.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_profile(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ProfileRequest>,
) -> Result<Json<User>, AppError> {
    let current = AuthService::new(state.pool()).get_user(user.id).await?;
    let update = body.merge(current)?;

    let updated = UserRepository::new(state.pool())
        .update_profile(user.id, &update)
        .await?;

    tracing::info!("Profile updated");
    Ok(Json(updated))
}

/// Update notification and privacy flags.
///
/// # Errors
///
/// 401 if the account no longer exists.
pub async fn update_settings(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(patch): JsonBody<UserSettingsPatch>,
) -> Result<Json<User>, AppError> {
    let current = AuthService::new(state.pool()).get_user(user.id).await?;

    let updated = UserRepository::new(state.pool())
        .update_settings(user.id, current.settings.apply(patch))
        .await?;

    Ok(Json(updated))
}

/// Change the password.
///
/// # Errors
///
/// 401 if the current password is wrong, 400 if the new one is too weak.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn change_password(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    AuthService::new(state.pool())
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete the account and end the session. Orders are kept without an owner.
///
/// # Errors
///
/// 401 if the password is wrong.
#[instrument(skip(state, session, user, body), fields(user_id = %user.id))]
pub async fn delete_account(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<DeleteAccountRequest>,
) -> Result<StatusCode, AppError> {
    AuthService::new(state.pool())
        .delete_account(user.id, &body.password)
        .await?;

    clear_current_user(&session).await?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders
// =============================================================================

/// The user's orders, newest first.
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn orders(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Order>>, AppError> {
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_user(user.id, params)
        .await?;

    Ok(Json(Page::new(orders, params, total)))
}

/// One of the user's orders with its items.
///
/// # Errors
///
/// 404 if the order doesn't exist or belongs to someone else.
pub async fn order(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    OrderRepository::new(state.pool())
        .get_for_user(user.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// Cancel an order that hasn't shipped. Items go back into stock; refunds
/// are handled by staff.
///
/// # Errors
///
/// 404 if the order isn't the user's, 409 once it has shipped.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel_order(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    let orders = OrderRepository::new(state.pool());

    let detail = orders
        .get_for_user(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if !detail.order.status.is_cancellable_by_customer() {
        return Err(AppError::Conflict(format!(
            "Orders that are {} can no longer be cancelled",
            detail.order.status
        )));
    }

    orders
        .transition(
            id,
            OrderStatus::Cancelled,
            &ShippingUpdate::default(),
            Some(user.id),
        )
        .await?;

    tracing::info!(order_id = %id, "Order cancelled by customer");

    orders
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use retro_vault_core::{Email, Role, UserId};

    use super::*;
    use crate::models::user::UserSettings;

    fn user() -> User {
        User {
            id: UserId::new(1),
            role: Role::Customer,
            email: Email::parse("link@hyrule.example").unwrap(),
            name: "Link".to_owned(),
            phone: Some("555-0100".to_owned()),
            avatar_url: None,
            bio: Some("It's dangerous to go alone".to_owned()),
            default_shipping_address: None,
            settings: UserSettings::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_profile_absent_fields_are_kept() {
        let update = ProfileRequest::default().merge(user()).unwrap();
        assert_eq!(update.name, "Link");
        assert_eq!(update.phone.as_deref(), Some("555-0100"));
        assert_eq!(update.bio.as_deref(), Some("It's dangerous to go alone"));
    }

    #[test]
    fn test_profile_blank_clears_optional_field() {
        let body: ProfileRequest = serde_json::from_str(r#"{"bio": "  ", "name": " Zelda "}"#).unwrap();
        let update = body.merge(user()).unwrap();
        assert_eq!(update.name, "Zelda");
        assert_eq!(update.bio, None);
        assert_eq!(update.phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn test_profile_null_address_clears_it() {
        let body: ProfileRequest =
            serde_json::from_str(r#"{"default_shipping_address": null}"#).unwrap();
        assert_eq!(body.default_shipping_address, Some(None));

        let body: ProfileRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(body.default_shipping_address, None);
    }

    #[test]
    fn test_profile_collects_every_invalid_field() {
        let body: ProfileRequest = serde_json::from_str(
            r#"{
                "name": "",
                "avatar_url": "javascript:alert(1)",
                "default_shipping_address": {
                    "full_name": "Link", "line1": "", "city": "Kakariko",
                    "postal_code": "12345", "country": "HY"
                }
            }"#,
        )
        .unwrap();

        let AppError::Validation { fields, .. } = body.merge(user()).unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("avatar_url"));
        assert!(fields.contains_key("default_shipping_address.line1"));
    }

    #[test]
    fn test_password_requests_do_not_debug_secrets() {
        let req = ChangePasswordRequest {
            current_password: "old-secret".to_owned(),
            new_password: "new-secret".to_owned(),
        };
        assert!(!format!("{req:?}").contains("secret"));
    }
}
