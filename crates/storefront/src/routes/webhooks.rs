//! Payment provider webhooks.
//!
//! Orders are placed synchronously by the confirm/capture endpoints, so
//! webhooks only record what the provider saw. A successful payment with no
//! matching order is logged as an error: the customer was charged and needs
//! a refund or a manual order.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use retro_vault_core::PaymentMethod;

use crate::db::OrderRepository;
use crate::error::AppError;
use crate::state::AppState;

const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Minimal `PayPal` webhook envelope.
#[derive(Debug, Deserialize)]
pub struct PaypalEvent {
    pub id: String,
    pub event_type: String,
    #[serde(default)]
    pub resource: serde_json::Value,
}

/// Look up the order for a completed payment and complain loudly if missing.
async fn reconcile(state: &AppState, method: PaymentMethod, payment_id: &str) {
    match OrderRepository::new(state.pool())
        .find_by_payment(method, payment_id)
        .await
    {
        Ok(Some(order_id)) => debug!(%order_id, payment_id, "Webhook payment matches order"),
        Ok(None) => {
            // The customer may still be on the confirm request.
            warn!(%method, payment_id, "Completed payment has no order yet");
        }
        Err(e) => error!(error = %e, payment_id, "Could not reconcile webhook payment"),
    }
}

/// Stripe events. The signature is verified when a webhook secret is set.
///
/// # Errors
///
/// 400 if the signature doesn't verify or the body isn't an event.
#[instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let event = match state.stripe().parse_webhook(signature, &body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Rejected Stripe webhook");
            return Err(e.into());
        }
    };

    let object_id = event
        .data
        .object
        .get("id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();

    info!(event_id = %event.id, event_type = %event.event_type, object_id, "Stripe webhook");

    match event.event_type.as_str() {
        "payment_intent.succeeded" => reconcile(&state, PaymentMethod::Stripe, object_id).await,
        "payment_intent.payment_failed" => {
            let reason = event
                .data
                .object
                .pointer("/last_payment_error/message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown");
            info!(payment_id = object_id, reason, "Card payment failed");
        }
        _ => {}
    }

    Ok(StatusCode::OK)
}

/// `PayPal` events.
///
/// # Errors
///
/// 400 if the body isn't an event.
#[instrument(skip_all)]
pub async fn paypal(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, AppError> {
    let event: PaypalEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid PayPal event: {e}")))?;

    info!(event_id = %event.id, event_type = %event.event_type, "PayPal webhook");

    if event.event_type == "CHECKOUT.ORDER.COMPLETED"
        && let Some(order_id) = event.resource.get("id").and_then(serde_json::Value::as_str)
    {
        reconcile(&state, PaymentMethod::Paypal, order_id).await;
    }

    Ok(StatusCode::OK)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_paypal_event_parses_without_resource() {
        let event: PaypalEvent =
            serde_json::from_str(r#"{"id": "WH-1", "event_type": "PAYMENT.CAPTURE.DENIED"}"#)
                .unwrap();
        assert_eq!(event.event_type, "PAYMENT.CAPTURE.DENIED");
        assert!(event.resource.is_null());
    }
}
