//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::email::EmailService;
use crate::services::payments::{PaymentError, PaypalClient, StripeClient};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    stripe: StripeClient,
    paypal: PaypalClient,
    email: Option<EmailService>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if a payment client or the SMTP transport can't be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let stripe = StripeClient::new(&config.payments)?;
        let paypal = PaypalClient::new(&config.payments, &config.base_url)?;

        let email = match &config.email {
            Some(email) => Some(EmailService::new(
                email,
                &config.base_url,
                &config.payments.currency,
            )?),
            None => {
                tracing::warn!("SMTP_HOST not set, order emails are disabled");
                None
            }
        };

        if config.payments.simulate {
            tracing::warn!("Payment simulation is on, no real money will move");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                paypal,
                email,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Stripe client (live, simulated or disabled).
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// `PayPal` client (live, simulated or disabled).
    #[must_use]
    pub fn paypal(&self) -> &PaypalClient {
        &self.inner.paypal
    }

    /// Mailer, if SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }
}
