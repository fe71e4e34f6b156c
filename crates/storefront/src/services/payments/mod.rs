//! Payment provider clients.
//!
//! # Providers
//!
//! - [`StripeClient`] - card payments via `PaymentIntents`
//! - [`PaypalClient`] - wallet payments via Orders v2
//!
//! Both clients run in one of two modes. Live mode talks to the provider's
//! REST API with `reqwest`. Simulated mode never touches the network: it
//! hands out synthetic ids and remembers the amount in a short-lived
//! in-memory cache so a later confirmation reports success for exactly the
//! amount that was created.

pub mod paypal;
pub mod stripe;

use rust_decimal::Decimal;
use thiserror::Error;

use retro_vault_core::MoneyError;

pub use paypal::{PaypalClient, PaypalOrder};
pub use stripe::{StripeClient, StripeEvent, StripeIntent};

/// How long simulated payments are remembered.
const SIMULATED_TTL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// Errors from a payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a non-success status.
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// Provider response could not be understood.
    #[error("failed to parse {provider} response: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },

    /// Provider rejected our credentials.
    #[error("{0} authentication failed")]
    Unauthorized(&'static str),

    /// Amount can't be expressed in the provider's format.
    #[error("invalid amount: {0}")]
    Amount(#[from] MoneyError),

    /// Provider id is malformed.
    #[error("invalid payment id")]
    InvalidId,

    /// Provider has no credentials and simulation is off.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Webhook signature did not verify.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),
}

impl PaymentError {
    /// Map a non-success response to an error, reading the body for a message.
    async fn from_response(provider: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Self::Unauthorized(provider);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Self::Api {
            provider,
            status,
            message: error_message(&body).unwrap_or(body),
        }
    }
}

/// Pull a human-readable message out of a provider error body.
///
/// Stripe nests it under `error.message`; `PayPal` uses a top-level `message`
/// with optional `details[].issue`.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    if let Some(message) = value.pointer("/error/message").and_then(|m| m.as_str()) {
        return Some(message.to_owned());
    }

    let message = value.get("message").and_then(|m| m.as_str())?;
    match value.pointer("/details/0/issue").and_then(|i| i.as_str()) {
        Some(issue) => Some(format!("{message} ({issue})")),
        None => Some(message.to_owned()),
    }
}

/// A payment as reported by its provider at confirmation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPayment {
    /// Provider handle (`pi_...` or `PayPal` order id).
    pub id: String,
    /// Raw provider status, for logs.
    pub status: String,
    /// Whether the money has been taken.
    pub completed: bool,
    /// Amount taken, in major units.
    pub amount: Decimal,
    /// Lowercase ISO currency code.
    pub currency: String,
}

impl ProviderPayment {
    /// Whether the provider took exactly `amount` in `currency`.
    #[must_use]
    pub fn matches(&self, amount: Decimal, currency: &str) -> bool {
        self.amount == amount && self.currency.eq_ignore_ascii_case(currency)
    }
}

/// Provider ids are interpolated into URLs, so only allow a safe alphabet.
fn validate_provider_id(id: &str) -> Result<(), PaymentError> {
    let valid = !id.is_empty()
        && id.len() <= 255
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid { Ok(()) } else { Err(PaymentError::InvalidId) }
}
