//! Checkout route handlers.
//!
//! Starting a payment stores a [`PendingPayment`] in the session; confirming
//! requires the same provider id back, then hands off to [`CheckoutService`].

use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use retro_vault_core::ShippingAddress;

use super::JsonBody;
use crate::db::UserRepository;
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::order::OrderDetail;
use crate::models::{CurrentUser, PendingPayment, session_keys};
use crate::services::checkout::{CheckoutService, PlacedOrder, Quote, spawn_confirmation_email};
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Response to `POST /api/checkout/stripe/intent`.
#[derive(Debug, Serialize)]
pub struct StripeIntentResponse {
    pub payment_intent_id: String,
    pub client_secret: String,
    pub amount: Decimal,
    pub currency: String,
    pub simulated: bool,
    pub quote: Quote,
}

/// `POST /api/checkout/stripe/confirm` body.
#[derive(Debug, Deserialize)]
pub struct StripeConfirmRequest {
    pub payment_intent_id: String,
    pub shipping_address: ShippingAddress,
}

/// Response to `POST /api/checkout/paypal/order`.
#[derive(Debug, Serialize)]
pub struct PaypalOrderResponse {
    pub order_id: String,
    pub approve_url: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub simulated: bool,
    pub quote: Quote,
}

/// `POST /api/checkout/paypal/capture` body.
#[derive(Debug, Deserialize)]
pub struct PaypalCaptureRequest {
    pub order_id: String,
    pub shipping_address: ShippingAddress,
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn pending_payment(session: &Session) -> Result<Option<PendingPayment>, AppError> {
    Ok(session
        .get::<PendingPayment>(session_keys::PENDING_PAYMENT)
        .await?)
}

async fn set_pending_payment(session: &Session, pending: &PendingPayment) -> Result<(), AppError> {
    session
        .insert(session_keys::PENDING_PAYMENT, pending)
        .await?;
    Ok(())
}

/// Clear the pending payment, send the receipt for new orders and pick the status.
async fn finish(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    placed: PlacedOrder,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    session
        .remove::<PendingPayment>(session_keys::PENDING_PAYMENT)
        .await?;

    if !placed.created {
        tracing::info!(order_id = %placed.detail.order.id, "Payment already confirmed, returning existing order");
        return Ok((StatusCode::OK, Json(placed.detail)));
    }

    tracing::info!(
        order_id = %placed.detail.order.id,
        total = %placed.detail.order.total,
        method = %placed.detail.order.payment_method,
        "Order placed"
    );

    match UserRepository::new(state.pool()).get_by_id(user.id).await {
        Ok(Some(account)) => {
            spawn_confirmation_email(state.email(), &account, placed.detail.clone());
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Could not load user for confirmation email"),
    }

    Ok((StatusCode::CREATED, Json(placed.detail)))
}

// =============================================================================
// Handlers
// =============================================================================

/// Quote the cart: lines at current prices, shipping and total.
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn summary(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Quote>, AppError> {
    let quote = CheckoutService::new(state.pool(), &state.config().shipping)
        .quote(user.id)
        .await?;
    Ok(Json(quote))
}

/// Create a Stripe `PaymentIntent` for the cart total.
///
/// # Errors
///
/// 400 for an empty cart, 409 if stock is short, 502/503 if Stripe fails or is off.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn stripe_intent(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<StripeIntentResponse>, AppError> {
    let started = CheckoutService::new(state.pool(), &state.config().shipping)
        .start_stripe(user.id, state.stripe())
        .await?;

    set_pending_payment(&session, &started.pending).await?;
    add_breadcrumb(
        "checkout",
        "Created payment intent",
        Some(&[("provider", "stripe"), ("id", &started.pending.provider_id)]),
    );

    Ok(Json(StripeIntentResponse {
        payment_intent_id: started.pending.provider_id,
        client_secret: started.client_secret,
        amount: started.pending.amount,
        currency: state.stripe().currency().to_owned(),
        simulated: state.stripe().is_simulated(),
        quote: started.quote,
    }))
}

/// Confirm a succeeded `PaymentIntent` and place the order.
///
/// Returns 201 with the new order, or 200 with the existing one if this
/// intent was already confirmed.
///
/// # Errors
///
/// 400 for a bad address or no pending payment, 403 for a foreign intent,
/// 402 if the payment hasn't succeeded, 409 if stock or the cart changed.
#[instrument(skip(state, session, user, body), fields(user_id = %user.id, intent = %body.payment_intent_id))]
pub async fn stripe_confirm(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<StripeConfirmRequest>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    let pending = pending_payment(&session).await?;

    let placed = CheckoutService::new(state.pool(), &state.config().shipping)
        .confirm_stripe(
            user.id,
            state.stripe(),
            pending.as_ref(),
            &body.payment_intent_id,
            &body.shipping_address,
        )
        .await?;

    finish(&state, &session, &user, placed).await
}

/// Create a `PayPal` order for the cart total.
///
/// # Errors
///
/// 400 for an empty cart, 409 if stock is short, 502/503 if `PayPal` fails or is off.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn paypal_order(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<PaypalOrderResponse>, AppError> {
    let started = CheckoutService::new(state.pool(), &state.config().shipping)
        .start_paypal(user.id, state.paypal())
        .await?;

    set_pending_payment(&session, &started.pending).await?;
    add_breadcrumb(
        "checkout",
        "Created PayPal order",
        Some(&[("provider", "paypal"), ("id", &started.pending.provider_id)]),
    );

    Ok(Json(PaypalOrderResponse {
        order_id: started.pending.provider_id,
        approve_url: started.approve_url,
        amount: started.pending.amount,
        currency: state.paypal().currency().to_owned(),
        simulated: state.paypal().is_simulated(),
        quote: started.quote,
    }))
}

/// Capture an approved `PayPal` order and place ours.
///
/// # Errors
///
/// Same as [`stripe_confirm`].
#[instrument(skip(state, session, user, body), fields(user_id = %user.id, paypal_order = %body.order_id))]
pub async fn paypal_capture(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<PaypalCaptureRequest>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    let pending = pending_payment(&session).await?;

    let placed = CheckoutService::new(state.pool(), &state.config().shipping)
        .capture_paypal(
            user.id,
            state.paypal(),
            pending.as_ref(),
            &body.order_id,
            &body.shipping_address,
        )
        .await?;

    finish(&state, &session, &user, placed).await
}
