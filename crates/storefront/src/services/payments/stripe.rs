//! Stripe `PaymentIntents` client and webhook signature verification.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use moka::future::Cache;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, instrument};

use retro_vault_core::money;

use super::{PaymentError, ProviderPayment, SIMULATED_TTL, validate_provider_id};
use crate::config::PaymentsConfig;

/// Stripe REST API base URL.
const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a webhook timestamp.
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

const PROVIDER: &str = "stripe";

type HmacSha256 = Hmac<Sha256>;

/// A `PaymentIntent` as returned by Stripe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StripeIntent {
    pub id: String,
    /// Secret the browser needs to confirm the card payment.
    pub client_secret: Option<String>,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

impl StripeIntent {
    /// Normalize for amount and status checks.
    #[must_use]
    pub fn to_payment(&self) -> ProviderPayment {
        ProviderPayment {
            id: self.id.clone(),
            status: self.status.clone(),
            completed: self.status == "succeeded",
            amount: money::from_minor_units(self.amount),
            currency: self.currency.to_lowercase(),
        }
    }
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

/// The object an event is about.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Stripe client.
///
/// Cheap to clone; the HTTP client and simulated state are shared.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    mode: Mode,
    currency: String,
    webhook_secret: Option<SecretString>,
}

enum Mode {
    Live {
        client: reqwest::Client,
        secret_key: SecretString,
    },
    Simulated {
        intents: Cache<String, StripeIntent>,
    },
    Disabled,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.inner.mode {
            Mode::Live { .. } => "live",
            Mode::Simulated { .. } => "simulated",
            Mode::Disabled => "disabled",
        };
        f.debug_struct("StripeClient")
            .field("mode", &mode)
            .field("currency", &self.inner.currency)
            .field("webhook_secret", &self.inner.webhook_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl StripeClient {
    /// Build a client from payment configuration.
    ///
    /// Simulation wins over configured keys so development never charges a card.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client fails to build.
    pub fn new(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let mode = if config.simulate {
            Mode::Simulated {
                intents: Cache::builder()
                    .max_capacity(10_000)
                    .time_to_live(SIMULATED_TTL)
                    .build(),
            }
        } else if let Some(stripe) = &config.stripe {
            Mode::Live {
                client: reqwest::Client::builder()
                    .timeout(Duration::from_secs(30))
                    .build()?,
                secret_key: stripe.secret_key.clone(),
            }
        } else {
            Mode::Disabled
        };

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                mode,
                currency: config.currency.clone(),
                webhook_secret: config
                    .stripe
                    .as_ref()
                    .and_then(|s| s.webhook_secret.clone()),
            }),
        })
    }

    /// Whether the client is answering from memory.
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self.inner.mode, Mode::Simulated { .. })
    }

    /// Currency intents are created in.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.inner.currency
    }

    /// Create a `PaymentIntent` for `amount`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Amount` if `amount` can't be sent in cents.
    /// Returns `PaymentError::Api` or `PaymentError::Http` if Stripe fails.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn create_intent(
        &self,
        amount: Decimal,
        reference: &str,
    ) -> Result<StripeIntent, PaymentError> {
        let cents = money::to_minor_units(amount)?;

        match &self.inner.mode {
            Mode::Live { client, secret_key } => {
                let cents = cents.to_string();
                let response = client
                    .post(format!("{STRIPE_API_BASE}/payment_intents"))
                    .bearer_auth(secret_key.expose_secret())
                    .form(&[
                        ("amount", cents.as_str()),
                        ("currency", self.inner.currency.as_str()),
                        ("automatic_payment_methods[enabled]", "true"),
                        ("metadata[reference]", reference),
                    ])
                    .send()
                    .await?;

                let intent = parse_intent(response).await?;
                debug!(intent_id = %intent.id, "Created Stripe PaymentIntent");
                Ok(intent)
            }
            Mode::Simulated { intents } => {
                let id = format!("pi_sim_{}", uuid::Uuid::new_v4().simple());
                let intent = StripeIntent {
                    client_secret: Some(format!("{id}_secret_sim")),
                    id: id.clone(),
                    amount: cents,
                    currency: self.inner.currency.clone(),
                    status: "requires_payment_method".to_owned(),
                };
                intents.insert(id, intent.clone()).await;
                debug!(intent_id = %intent.id, "Created simulated PaymentIntent");
                Ok(intent)
            }
            Mode::Disabled => Err(PaymentError::NotConfigured("Stripe")),
        }
    }

    /// Fetch a `PaymentIntent` by id.
    ///
    /// A simulated intent reports `succeeded` once it has been created, as
    /// if the customer had completed the card form.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidId` for malformed ids.
    /// Returns `PaymentError::Api` if Stripe doesn't know the intent.
    #[instrument(skip(self))]
    pub async fn retrieve_intent(&self, id: &str) -> Result<StripeIntent, PaymentError> {
        validate_provider_id(id)?;

        match &self.inner.mode {
            Mode::Live { client, secret_key } => {
                let response = client
                    .get(format!("{STRIPE_API_BASE}/payment_intents/{id}"))
                    .bearer_auth(secret_key.expose_secret())
                    .send()
                    .await?;

                parse_intent(response).await
            }
            Mode::Simulated { intents } => {
                let mut intent = intents.get(id).await.ok_or_else(|| PaymentError::Api {
                    provider: PROVIDER,
                    status: 404,
                    message: format!("No such payment_intent: '{id}'"),
                })?;
                intent.status = "succeeded".to_owned();
                Ok(intent)
            }
            Mode::Disabled => Err(PaymentError::NotConfigured("Stripe")),
        }
    }

    /// Verify a webhook delivery and parse its event.
    ///
    /// Deliveries are accepted unverified when no webhook secret is configured.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if the signature doesn't verify.
    /// Returns `PaymentError::Parse` if the body isn't an event.
    pub fn parse_webhook(
        &self,
        signature_header: Option<&str>,
        body: &[u8],
    ) -> Result<StripeEvent, PaymentError> {
        if let Some(secret) = &self.inner.webhook_secret {
            let header = signature_header
                .ok_or_else(|| PaymentError::InvalidSignature("missing header".to_owned()))?;
            verify_webhook_signature(secret, header, body, chrono::Utc::now().timestamp())?;
        }

        serde_json::from_slice(body).map_err(|e| PaymentError::Parse {
            provider: PROVIDER,
            message: e.to_string(),
        })
    }
}

async fn parse_intent(response: reqwest::Response) -> Result<StripeIntent, PaymentError> {
    if !response.status().is_success() {
        return Err(PaymentError::from_response(PROVIDER, response).await);
    }

    response.json().await.map_err(|e| PaymentError::Parse {
        provider: PROVIDER,
        message: e.to_string(),
    })
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`).
///
/// The signed payload is `"{t}.{body}"`. Any `v1` entry may match, which is
/// how Stripe signs during secret rotation.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the header is malformed, too
/// old, or no signature matches.
pub fn verify_webhook_signature(
    secret: &SecretString,
    header: &str,
    body: &[u8],
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_owned()))?;

    if now.abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECS.unsigned_abs() {
        return Err(PaymentError::InvalidSignature(
            "timestamp outside tolerance".to_owned(),
        ));
    }

    let mac = {
        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac
    };

    let matched = signatures.iter().any(|sig| {
        hex::decode(sig).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });

    if matched {
        debug!("Stripe webhook signature verified");
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature(
            "no matching signature".to_owned(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    const SECRET: &str = "whsec_test_secret";

    fn sign(timestamp: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_verify_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let header = format!("t=1700000000,v1={}", sign(1_700_000_000, body));
        let secret = SecretString::from(SECRET.to_owned());

        assert!(verify_webhook_signature(&secret, &header, body, 1_700_000_010).is_ok());
    }

    #[test]
    fn test_verify_accepts_any_v1_during_rotation() {
        let body = b"{}";
        let header = format!(
            "t=1700000000,v1={},v1={}",
            "00".repeat(32),
            sign(1_700_000_000, body)
        );
        let secret = SecretString::from(SECRET.to_owned());

        assert!(verify_webhook_signature(&secret, &header, body, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampered_body() {
        let header = format!("t=1700000000,v1={}", sign(1_700_000_000, b"original"));
        let secret = SecretString::from(SECRET.to_owned());

        assert!(matches!(
            verify_webhook_signature(&secret, &header, b"tampered", 1_700_000_000),
            Err(PaymentError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_verify_rejects_stale_timestamp() {
        let body = b"{}";
        let header = format!("t=1700000000,v1={}", sign(1_700_000_000, body));
        let secret = SecretString::from(SECRET.to_owned());

        assert!(
            verify_webhook_signature(&secret, &header, body, 1_700_000_000 + 301).is_err()
        );
    }

    #[test]
    fn test_verify_rejects_extreme_timestamps() {
        let secret = SecretString::from(SECRET.to_owned());
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={t},v1=00");
            assert!(verify_webhook_signature(&secret, &header, b"{}", 1_700_000_000).is_err());
        }
        assert!(verify_webhook_signature(&secret, "t=0,v1=00", b"{}", i64::MIN).is_err());
    }

    #[test]
    fn test_verify_rejects_missing_timestamp() {
        let secret = SecretString::from(SECRET.to_owned());
        assert!(verify_webhook_signature(&secret, "v1=abcd", b"{}", 0).is_err());
    }

    #[test]
    fn test_parse_intent_fixture() {
        let json = r#"{
            "id": "pi_3MtwBwLkdIwHu7ix28a3tqPa",
            "object": "payment_intent",
            "amount": 2000,
            "currency": "usd",
            "status": "succeeded",
            "client_secret": "pi_3MtwBwLkdIwHu7ix28a3tqPa_secret_YrKJUKribcBjcG8HVhfZluoGH"
        }"#;
        let intent: StripeIntent = serde_json::from_str(json).unwrap();
        let payment = intent.to_payment();

        assert!(payment.completed);
        assert_eq!(payment.amount, Decimal::new(2000, 2));
        assert!(payment.matches(Decimal::new(20, 0), "usd"));
    }

    #[test]
    fn test_parse_event_fixture() {
        let json = r#"{
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_1", "amount": 100}}
        }"#;
        let client = StripeClient::new(&test_config().payments).unwrap();
        let event = client.parse_webhook(None, json.as_bytes()).unwrap();

        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.data.object["id"], "pi_1");
    }

    #[tokio::test]
    async fn test_simulated_intent_succeeds_with_created_amount() {
        let client = StripeClient::new(&test_config().payments).unwrap();
        assert!(client.is_simulated());

        let created = client
            .create_intent(Decimal::new(4598, 2), "user-1")
            .await
            .unwrap();
        assert!(created.client_secret.is_some());
        assert_ne!(created.status, "succeeded");

        let retrieved = client.retrieve_intent(&created.id).await.unwrap();
        let payment = retrieved.to_payment();
        assert!(payment.completed);
        assert_eq!(payment.amount, Decimal::new(4598, 2));
    }

    #[tokio::test]
    async fn test_simulated_unknown_intent() {
        let client = StripeClient::new(&test_config().payments).unwrap();
        assert!(matches!(
            client.retrieve_intent("pi_sim_missing").await,
            Err(PaymentError::Api { status: 404, .. })
        ));
    }
}
