//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side failures to
//! Sentry before responding to the client. All route handlers should return
//! `Result<T, AppError>`.
//!
//! Every error renders as `{"error": "..."}`; validation failures add a
//! `fields` object keyed by input name.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use retro_vault_core::AddressError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::payments::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart mutation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment provider call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Request body failed validation.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AddressError> for AppError {
    fn from(err: AddressError) -> Self {
        Self::Validation {
            message: "invalid shipping address".to_owned(),
            fields: err
                .0
                .into_iter()
                .map(|(field, message)| (field.to_owned(), message))
                .collect(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session: {err}"))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a BTreeMap<String, String>>,
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn payment_status(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::InvalidId | PaymentError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
        PaymentError::Api { status: 404, .. } => StatusCode::NOT_FOUND,
        PaymentError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        PaymentError::Amount(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PaymentError::Http(_)
        | PaymentError::Api { .. }
        | PaymentError::Parse { .. }
        | PaymentError::Unauthorized(_) => StatusCode::BAD_GATEWAY,
    }
}

fn payment_message(err: &PaymentError) -> String {
    match err {
        PaymentError::InvalidId => "Invalid payment id".to_string(),
        PaymentError::InvalidSignature(_) => "Invalid signature".to_string(),
        PaymentError::Api { status: 404, .. } => "Payment not found".to_string(),
        PaymentError::NotConfigured(provider) => format!("{provider} payments are unavailable"),
        PaymentError::Amount(_) => "Internal server error".to_string(),
        _ => "Payment provider error".to_string(),
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidName(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(err) => repository_status(err),
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(err) => match err {
                CartError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
                CartError::GameNotFound | CartError::LineNotFound => StatusCode::NOT_FOUND,
                CartError::InsufficientStock { .. } => StatusCode::CONFLICT,
                CartError::Repository(err) => repository_status(err),
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::NoPendingPayment
                | CheckoutError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
                CheckoutError::PaymentMismatch => StatusCode::FORBIDDEN,
                CheckoutError::PaymentNotCompleted(_) => StatusCode::PAYMENT_REQUIRED,
                CheckoutError::OutOfStock { .. }
                | CheckoutError::AmountMismatch
                | CheckoutError::CartChanged => StatusCode::CONFLICT,
                CheckoutError::Payment(err) => payment_status(err),
                CheckoutError::Repository(err) => repository_status(err),
            },
            Self::Payment(err) => payment_status(err),
            Self::Validation { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            return match self {
                Self::Payment(err) | Self::Checkout(CheckoutError::Payment(err)) => {
                    payment_message(err)
                }
                _ => "Internal server error".to_string(),
            };
        }

        match self {
            Self::Database(RepositoryError::NotFound)
            | Self::Cart(CartError::Repository(RepositoryError::NotFound))
            | Self::Checkout(CheckoutError::Repository(RepositoryError::NotFound)) => {
                "Not found".to_string()
            }
            Self::Database(RepositoryError::Conflict(msg))
            | Self::Auth(AuthError::Repository(RepositoryError::Conflict(msg)))
            | Self::Cart(CartError::Repository(RepositoryError::Conflict(msg)))
            | Self::Checkout(CheckoutError::Repository(RepositoryError::Conflict(msg))) => {
                msg.clone()
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    "Invalid credentials".to_string()
                }
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                other => other.to_string(),
            },
            Self::Cart(err) => err.to_string(),
            Self::Checkout(CheckoutError::InvalidAddress(_)) => {
                "invalid shipping address".to_string()
            }
            Self::Checkout(CheckoutError::Payment(err)) | Self::Payment(err) => {
                payment_message(err)
            }
            Self::Checkout(err) => err.to_string(),
            Self::Validation { message, .. }
            | Self::NotFound(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::Conflict(message)
            | Self::BadRequest(message) => message.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    fn fields(&self) -> Option<BTreeMap<String, String>> {
        match self {
            Self::Validation { fields, .. } => Some(fields.clone()),
            Self::Checkout(CheckoutError::InvalidAddress(err)) => Some(
                err.0
                    .iter()
                    .map(|(field, message)| ((*field).to_owned(), message.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        // Don't expose internal error details to clients
        let message = self.public_message();
        let fields = self.fields();

        (
            status,
            Json(ErrorBody {
                error: &message,
                fields: fields.as_ref(),
            }),
        )
            .into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Created payment", Some(&[("provider", "stripe")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    async fn body(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("game".to_string());
        assert_eq!(err.to_string(), "Not found: game");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors() {
        assert_eq!(status(RepositoryError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(RepositoryError::Conflict("in use".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(RepositoryError::DataCorruption("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(status(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::UserAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(
            status(AuthError::WeakPassword("short".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_checkout_errors() {
        assert_eq!(status(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(CheckoutError::OutOfStock {
                title: "Contra".into(),
                requested: 2,
                available: 1
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(CheckoutError::PaymentNotCompleted("processing".into())),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(status(CheckoutError::PaymentMismatch), StatusCode::FORBIDDEN);
        assert_eq!(
            status(CheckoutError::Payment(PaymentError::Unauthorized("stripe"))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_cart_errors() {
        assert_eq!(
            status(CartError::InvalidQuantity { min: 1 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(CartError::InsufficientStock {
                title: "Contra".into(),
                available: 0
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status(CartError::GameNotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_payment_errors() {
        assert_eq!(
            status(PaymentError::NotConfigured("paypal")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(PaymentError::Api {
                provider: "stripe",
                status: 404,
                message: "No such payment_intent".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(PaymentError::Api {
                provider: "stripe",
                status: 500,
                message: "boom".into()
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let json = body(AppError::Database(RepositoryError::DataCorruption(
            "role 'ghost'".into(),
        )))
        .await;
        assert_eq!(json["error"], "Internal server error");
        assert!(json.get("fields").is_none());
    }

    #[tokio::test]
    async fn test_address_errors_list_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("city", "city is required".to_string());
        let json = body(AddressError(fields).into()).await;

        assert_eq!(json["error"], "invalid shipping address");
        assert_eq!(json["fields"]["city"], "city is required");
    }

    #[tokio::test]
    async fn test_conflict_message_passes_through() {
        let json = body(AppError::Database(RepositoryError::Conflict(
            "console is used by 2 game(s)".into(),
        )))
        .await;
        assert_eq!(json["error"], "console is used by 2 game(s)");
    }
}
