//! `PayPal` Orders v2 client.
//!
//! Uses client-credentials OAuth; the access token is cached in memory and
//! reused until shortly before `PayPal` would expire it.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use retro_vault_core::money;

use super::{PaymentError, ProviderPayment, SIMULATED_TTL, validate_provider_id};
use crate::config::PaymentsConfig;

const PROVIDER: &str = "paypal";

/// Tokens live nine hours at `PayPal`; refresh well before that.
const TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

const TOKEN_KEY: &str = "access_token";

/// A `PayPal` order as returned by create, get or capture.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaypalOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PurchaseUnit {
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default)]
    pub payments: Option<Payments>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Payments {
    #[serde(default)]
    pub captures: Vec<Capture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Capture {
    pub id: String,
    pub status: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub currency_code: String,
    pub value: String,
}

impl PaypalOrder {
    /// URL the buyer is sent to for approval.
    #[must_use]
    pub fn approve_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.as_str())
    }

    /// Normalize a captured order for amount and status checks.
    ///
    /// Only `COMPLETED` captures count towards the amount.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Parse` if a capture amount isn't a decimal or
    /// captures mix currencies.
    pub fn to_payment(&self) -> Result<ProviderPayment, PaymentError> {
        let mut amount = Decimal::ZERO;
        let mut currency: Option<String> = None;

        let captures = self
            .purchase_units
            .iter()
            .filter_map(|u| u.payments.as_ref())
            .flat_map(|p| &p.captures)
            .filter(|c| c.status == "COMPLETED");

        for capture in captures {
            let value: Decimal = capture.amount.value.parse().map_err(|_| PaymentError::Parse {
                provider: PROVIDER,
                message: format!("invalid capture amount: {}", capture.amount.value),
            })?;

            let code = capture.amount.currency_code.to_lowercase();
            match &currency {
                Some(existing) if *existing != code => {
                    return Err(PaymentError::Parse {
                        provider: PROVIDER,
                        message: "captures in mixed currencies".to_owned(),
                    });
                }
                Some(_) => {}
                None => currency = Some(code),
            }

            amount += value;
        }

        Ok(ProviderPayment {
            id: self.id.clone(),
            status: self.status.clone(),
            completed: self.status == "COMPLETED" && amount > Decimal::ZERO,
            amount,
            currency: currency.unwrap_or_default(),
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    intent: &'static str,
    purchase_units: [CreatePurchaseUnit<'a>; 1],
    application_context: ApplicationContext<'a>,
}

#[derive(Serialize)]
struct CreatePurchaseUnit<'a> {
    reference_id: &'a str,
    amount: Amount,
}

#[derive(Serialize)]
struct ApplicationContext<'a> {
    brand_name: &'static str,
    shipping_preference: &'static str,
    user_action: &'static str,
    return_url: &'a str,
    cancel_url: &'a str,
}

/// `PayPal` client.
#[derive(Clone)]
pub struct PaypalClient {
    inner: Arc<PaypalClientInner>,
}

struct PaypalClientInner {
    mode: Mode,
    currency: String,
    return_url: String,
    cancel_url: String,
}

enum Mode {
    Live {
        client: reqwest::Client,
        client_id: String,
        client_secret: SecretString,
        api_base: String,
        token: Cache<&'static str, SecretString>,
    },
    Simulated {
        orders: Cache<String, Amount>,
    },
    Disabled,
}

impl std::fmt::Debug for PaypalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.inner.mode {
            Mode::Live { api_base, .. } => api_base.as_str(),
            Mode::Simulated { .. } => "simulated",
            Mode::Disabled => "disabled",
        };
        f.debug_struct("PaypalClient")
            .field("mode", &mode)
            .field("currency", &self.inner.currency)
            .finish_non_exhaustive()
    }
}

impl PaypalClient {
    /// Build a client from payment configuration.
    ///
    /// `base_url` is the public storefront URL buyers return to after approval.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client fails to build.
    pub fn new(config: &PaymentsConfig, base_url: &str) -> Result<Self, PaymentError> {
        let mode = if config.simulate {
            Mode::Simulated {
                orders: Cache::builder()
                    .max_capacity(10_000)
                    .time_to_live(SIMULATED_TTL)
                    .build(),
            }
        } else if let Some(paypal) = &config.paypal {
            Mode::Live {
                client: reqwest::Client::builder()
                    .timeout(Duration::from_secs(30))
                    .build()?,
                client_id: paypal.client_id.clone(),
                client_secret: paypal.client_secret.clone(),
                api_base: paypal.api_base.clone(),
                token: Cache::builder()
                    .max_capacity(1)
                    .time_to_live(TOKEN_TTL)
                    .build(),
            }
        } else {
            Mode::Disabled
        };

        let base_url = base_url.trim_end_matches('/');

        Ok(Self {
            inner: Arc::new(PaypalClientInner {
                mode,
                currency: config.currency.to_uppercase(),
                return_url: format!("{base_url}/checkout/paypal/return"),
                cancel_url: format!("{base_url}/checkout"),
            }),
        })
    }

    /// Whether the client is answering from memory.
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self.inner.mode, Mode::Simulated { .. })
    }

    /// Uppercase ISO currency code orders are created in.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.inner.currency
    }

    /// Create an order for `amount` awaiting buyer approval.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Api` or `PaymentError::Http` if `PayPal` fails.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn create_order(
        &self,
        amount: Decimal,
        reference: &str,
    ) -> Result<PaypalOrder, PaymentError> {
        let amount = Amount {
            currency_code: self.inner.currency.clone(),
            value: money::format_amount(amount),
        };

        match &self.inner.mode {
            Mode::Live {
                client, api_base, ..
            } => {
                let token = self.access_token().await?;
                let response = client
                    .post(format!("{api_base}/v2/checkout/orders"))
                    .bearer_auth(token.expose_secret())
                    .json(&CreateOrderRequest {
                        intent: "CAPTURE",
                        purchase_units: [CreatePurchaseUnit {
                            reference_id: reference,
                            amount,
                        }],
                        application_context: ApplicationContext {
                            brand_name: "Retro Vault",
                            shipping_preference: "NO_SHIPPING",
                            user_action: "PAY_NOW",
                            return_url: &self.inner.return_url,
                            cancel_url: &self.inner.cancel_url,
                        },
                    })
                    .send()
                    .await?;

                let order = parse_order(response).await?;
                debug!(order_id = %order.id, "Created PayPal order");
                Ok(order)
            }
            Mode::Simulated { orders } => {
                let id = format!("SIM{}", uuid::Uuid::new_v4().simple()).to_uppercase();
                orders.insert(id.clone(), amount.clone()).await;
                debug!(order_id = %id, "Created simulated PayPal order");

                Ok(PaypalOrder {
                    links: vec![Link {
                        href: format!("{}?token={id}", self.inner.return_url),
                        rel: "approve".to_owned(),
                    }],
                    id,
                    status: "CREATED".to_owned(),
                    purchase_units: vec![PurchaseUnit {
                        amount: Some(amount),
                        payments: None,
                    }],
                })
            }
            Mode::Disabled => Err(PaymentError::NotConfigured("PayPal")),
        }
    }

    /// Capture an approved order.
    ///
    /// Capturing an order that was already captured returns its current
    /// state instead of failing, so a retried confirmation still succeeds.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidId` for malformed ids.
    /// Returns `PaymentError::Api` if `PayPal` refuses the capture.
    #[instrument(skip(self))]
    pub async fn capture_order(&self, id: &str) -> Result<PaypalOrder, PaymentError> {
        validate_provider_id(id)?;

        match &self.inner.mode {
            Mode::Live {
                client, api_base, ..
            } => {
                let token = self.access_token().await?;
                let response = client
                    .post(format!("{api_base}/v2/checkout/orders/{id}/capture"))
                    .bearer_auth(token.expose_secret())
                    .header("Prefer", "return=representation")
                    .json(&serde_json::json!({}))
                    .send()
                    .await?;

                match parse_order(response).await {
                    Err(PaymentError::Api {
                        status: 422,
                        message,
                        ..
                    }) if message.contains("ORDER_ALREADY_CAPTURED") => {
                        warn!(order_id = %id, "PayPal order already captured, fetching it");
                        self.get_order(id).await
                    }
                    other => other,
                }
            }
            Mode::Simulated { orders } => {
                let amount = orders.get(id).await.ok_or_else(|| PaymentError::Api {
                    provider: PROVIDER,
                    status: 404,
                    message: format!("order {id} not found (RESOURCE_NOT_FOUND)"),
                })?;

                Ok(PaypalOrder {
                    id: id.to_owned(),
                    status: "COMPLETED".to_owned(),
                    links: Vec::new(),
                    purchase_units: vec![PurchaseUnit {
                        amount: None,
                        payments: Some(Payments {
                            captures: vec![Capture {
                                id: format!("CAP{id}"),
                                status: "COMPLETED".to_owned(),
                                amount,
                            }],
                        }),
                    }],
                })
            }
            Mode::Disabled => Err(PaymentError::NotConfigured("PayPal")),
        }
    }

    async fn get_order(&self, id: &str) -> Result<PaypalOrder, PaymentError> {
        let Mode::Live {
            client, api_base, ..
        } = &self.inner.mode
        else {
            return Err(PaymentError::NotConfigured("PayPal"));
        };

        let token = self.access_token().await?;
        let response = client
            .get(format!("{api_base}/v2/checkout/orders/{id}"))
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        parse_order(response).await
    }

    /// Cached OAuth access token, fetched on first use or after expiry.
    async fn access_token(&self) -> Result<SecretString, PaymentError> {
        let Mode::Live {
            client,
            client_id,
            client_secret,
            api_base,
            token,
        } = &self.inner.mode
        else {
            return Err(PaymentError::NotConfigured("PayPal"));
        };

        token
            .try_get_with(TOKEN_KEY, async {
                let response = client
                    .post(format!("{api_base}/v1/oauth2/token"))
                    .basic_auth(client_id, Some(client_secret.expose_secret()))
                    .form(&[("grant_type", "client_credentials")])
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(PaymentError::from_response(PROVIDER, response).await);
                }

                let body: TokenResponse =
                    response.json().await.map_err(|e| PaymentError::Parse {
                        provider: PROVIDER,
                        message: e.to_string(),
                    })?;

                debug!("Fetched PayPal access token");
                Ok(SecretString::from(body.access_token))
            })
            .await
            .map_err(|e: Arc<PaymentError>| match e.as_ref() {
                PaymentError::Unauthorized(p) => PaymentError::Unauthorized(*p),
                other => PaymentError::Api {
                    provider: PROVIDER,
                    status: 502,
                    message: format!("token request failed: {other}"),
                },
            })
    }
}

async fn parse_order(response: reqwest::Response) -> Result<PaypalOrder, PaymentError> {
    if !response.status().is_success() {
        return Err(PaymentError::from_response(PROVIDER, response).await);
    }

    response.json().await.map_err(|e| PaymentError::Parse {
        provider: PROVIDER,
        message: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    const CAPTURE_FIXTURE: &str = r#"{
        "id": "5O190127TN364715T",
        "status": "COMPLETED",
        "purchase_units": [{
            "reference_id": "default",
            "payments": {
                "captures": [
                    {"id": "3C679366HH908993F", "status": "COMPLETED",
                     "amount": {"currency_code": "USD", "value": "100.00"}},
                    {"id": "3C679366HH908993G", "status": "DECLINED",
                     "amount": {"currency_code": "USD", "value": "50.00"}}
                ]
            }
        }],
        "links": [{"href": "https://api-m.paypal.com/v2/checkout/orders/5O190127TN364715T", "rel": "self", "method": "GET"}]
    }"#;

    #[test]
    fn test_capture_fixture_counts_completed_only() {
        let order: PaypalOrder = serde_json::from_str(CAPTURE_FIXTURE).unwrap();
        let payment = order.to_payment().unwrap();

        assert!(payment.completed);
        assert_eq!(payment.amount, Decimal::new(100, 0));
        assert_eq!(payment.currency, "usd");
    }

    #[test]
    fn test_create_fixture_approve_link() {
        let json = r#"{
            "id": "5O190127TN364715T",
            "status": "PAYER_ACTION_REQUIRED",
            "links": [
                {"href": "https://api-m.paypal.com/v2/checkout/orders/5O190127TN364715T", "rel": "self"},
                {"href": "https://www.paypal.com/checkoutnow?token=5O190127TN364715T", "rel": "payer-action"}
            ]
        }"#;
        let order: PaypalOrder = serde_json::from_str(json).unwrap();

        assert_eq!(
            order.approve_url(),
            Some("https://www.paypal.com/checkoutnow?token=5O190127TN364715T")
        );
        assert!(!order.to_payment().unwrap().completed);
    }

    #[test]
    fn test_mixed_currency_captures_rejected() {
        let json = r#"{
            "id": "X", "status": "COMPLETED",
            "purchase_units": [{"payments": {"captures": [
                {"id": "a", "status": "COMPLETED", "amount": {"currency_code": "USD", "value": "1.00"}},
                {"id": "b", "status": "COMPLETED", "amount": {"currency_code": "EUR", "value": "1.00"}}
            ]}}]
        }"#;
        let order: PaypalOrder = serde_json::from_str(json).unwrap();
        assert!(order.to_payment().is_err());
    }

    #[tokio::test]
    async fn test_simulated_create_then_capture() {
        let client = PaypalClient::new(&test_config().payments, "http://localhost:3000/").unwrap();
        assert!(client.is_simulated());

        let order = client
            .create_order(Decimal::new(7598, 2), "user-7")
            .await
            .unwrap();
        assert!(
            order
                .approve_url()
                .unwrap()
                .starts_with("http://localhost:3000/checkout/paypal/return?token=")
        );

        let captured = client.capture_order(&order.id).await.unwrap();
        let payment = captured.to_payment().unwrap();
        assert!(payment.completed);
        assert!(payment.matches(Decimal::new(7598, 2), "usd"));
    }

    #[tokio::test]
    async fn test_simulated_capture_unknown_order() {
        let client = PaypalClient::new(&test_config().payments, "http://localhost").unwrap();
        assert!(matches!(
            client.capture_order("NOPE").await,
            Err(PaymentError::Api { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_disabled_without_credentials() {
        let mut config = test_config().payments;
        config.simulate = false;
        let client = PaypalClient::new(&config, "http://localhost").unwrap();

        assert!(matches!(
            client.create_order(Decimal::ONE, "ref").await,
            Err(PaymentError::NotConfigured(_))
        ));
    }
}
