//! Checkout: quoting the cart, starting provider payments and turning a
//! confirmed payment into an order.
//!
//! # Flow
//!
//! 1. `start_*` quotes the cart, creates the provider payment for the quote
//!    total and returns a [`PendingPayment`] for the caller to keep in the
//!    session.
//! 2. `confirm_stripe` / `capture_paypal` check the client's provider id
//!    against that pending payment, ask the provider whether the money was
//!    taken (and how much), re-quote the cart and place the order.
//!
//! A provider payment maps to at most one order, so confirming twice
//! returns the first order.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, instrument, warn};

use retro_vault_core::{
    AddressError, GameId, OrderId, OrderStatus, PaymentMethod, ShippingAddress, UserId, money,
};

use super::email::EmailService;
use super::payments::{PaymentError, PaypalClient, ProviderPayment, StripeClient};
use crate::config::ShippingConfig;
use crate::db::orders::PlaceOrder;
use crate::db::{CartRepository, OrderRepository, RepositoryError};
use crate::models::PendingPayment;
use crate::models::cart::CartLine;
use crate::models::order::{NewOrder, NewOrderItem, OrderDetail};
use crate::models::user::User;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to buy.
    #[error("your cart is empty")]
    EmptyCart,

    /// A line asks for more units than are in stock.
    #[error("only {available} of \"{title}\" left in stock (requested {requested})")]
    OutOfStock {
        title: String,
        requested: i32,
        available: i32,
    },

    /// No payment was started in this session.
    #[error("no payment in progress; start checkout again")]
    NoPendingPayment,

    /// Client sent a provider id this session didn't create.
    #[error("payment does not belong to this checkout")]
    PaymentMismatch,

    /// Provider hasn't taken the money yet.
    #[error("payment not completed (status: {0})")]
    PaymentNotCompleted(String),

    /// Provider took a different amount than was quoted.
    #[error("payment amount does not match the order total")]
    AmountMismatch,

    /// Cart changed between starting and confirming payment.
    #[error("your cart changed after payment was started; contact support for a refund")]
    CartChanged,

    /// Shipping address failed validation.
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    /// Provider call failed.
    #[error("payment provider error: {0}")]
    Payment(#[from] PaymentError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A cart line priced for checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteLine {
    pub game_id: GameId,
    pub title: String,
    pub quantity: i32,
    /// Current effective price.
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub stock: i32,
    pub available: bool,
}

/// What the customer would pay right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub item_count: i64,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl Quote {
    /// Price cart lines at their current price and add shipping.
    ///
    /// An empty cart ships for free.
    #[must_use]
    pub fn from_lines(lines: &[CartLine], shipping: &ShippingConfig) -> Self {
        let lines: Vec<QuoteLine> = lines
            .iter()
            .map(|l| QuoteLine {
                game_id: l.game_id,
                title: l.title.clone(),
                quantity: l.quantity,
                unit_price: l.current_price,
                line_total: money::line_total(l.current_price, l.quantity),
                stock: l.stock,
                available: l.is_available(),
            })
            .collect();

        let subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();
        let shipping = if lines.is_empty() {
            Decimal::ZERO
        } else {
            shipping.cost_for(subtotal)
        };

        Self {
            item_count: lines.iter().map(|l| i64::from(l.quantity)).sum(),
            lines,
            subtotal,
            shipping,
            total: subtotal + shipping,
        }
    }

    /// Check the quote can be paid for.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or `CheckoutError::OutOfStock`.
    pub fn ensure_purchasable(&self) -> Result<(), CheckoutError> {
        if self.lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        if let Some(line) = self.lines.iter().find(|l| !l.available) {
            return Err(CheckoutError::OutOfStock {
                title: line.title.clone(),
                requested: line.quantity,
                available: line.stock,
            });
        }

        Ok(())
    }
}

/// Outcome of confirming a payment.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub detail: OrderDetail,
    /// `false` when the payment had already been turned into this order.
    pub created: bool,
}

/// A started Stripe payment.
#[derive(Debug, Clone)]
pub struct StartedStripe {
    pub client_secret: String,
    pub pending: PendingPayment,
    pub quote: Quote,
}

/// A started `PayPal` payment.
#[derive(Debug, Clone)]
pub struct StartedPaypal {
    pub approve_url: Option<String>,
    pub pending: PendingPayment,
    pub quote: Quote,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    cart: CartRepository<'a>,
    orders: OrderRepository<'a>,
    shipping: &'a ShippingConfig,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, shipping: &'a ShippingConfig) -> Self {
        Self {
            cart: CartRepository::new(pool),
            orders: OrderRepository::new(pool),
            shipping,
        }
    }

    /// Quote the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the cart can't be read.
    pub async fn quote(&self, user_id: UserId) -> Result<Quote, CheckoutError> {
        let lines = self.cart.lines(user_id).await?;
        Ok(Quote::from_lines(&lines, self.shipping))
    }

    async fn purchasable_quote(&self, user_id: UserId) -> Result<Quote, CheckoutError> {
        let quote = self.quote(user_id).await?;
        quote.ensure_purchasable()?;
        Ok(quote)
    }

    /// Create a Stripe `PaymentIntent` for the cart total.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or `CheckoutError::OutOfStock` if
    /// the cart can't be bought, `CheckoutError::Payment` if Stripe fails.
    #[instrument(skip(self, stripe), fields(user_id = %user_id))]
    pub async fn start_stripe(
        &self,
        user_id: UserId,
        stripe: &StripeClient,
    ) -> Result<StartedStripe, CheckoutError> {
        let quote = self.purchasable_quote(user_id).await?;
        let intent = stripe
            .create_intent(quote.total, &format!("user-{user_id}"))
            .await?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            CheckoutError::Payment(PaymentError::Parse {
                provider: "stripe",
                message: "PaymentIntent has no client_secret".to_owned(),
            })
        })?;

        Ok(StartedStripe {
            client_secret,
            pending: PendingPayment {
                method: PaymentMethod::Stripe,
                provider_id: intent.id,
                amount: quote.total,
            },
            quote,
        })
    }

    /// Create a `PayPal` order for the cart total.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or `CheckoutError::OutOfStock` if
    /// the cart can't be bought, `CheckoutError::Payment` if `PayPal` fails.
    #[instrument(skip(self, paypal), fields(user_id = %user_id))]
    pub async fn start_paypal(
        &self,
        user_id: UserId,
        paypal: &PaypalClient,
    ) -> Result<StartedPaypal, CheckoutError> {
        let quote = self.purchasable_quote(user_id).await?;
        let order = paypal
            .create_order(quote.total, &format!("user-{user_id}"))
            .await?;

        Ok(StartedPaypal {
            approve_url: order.approve_url().map(str::to_owned),
            pending: PendingPayment {
                method: PaymentMethod::Paypal,
                provider_id: order.id,
                amount: quote.total,
            },
            quote,
        })
    }

    /// Confirm a Stripe payment and place the order.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`]; every variant except `EmptyCart` can occur.
    #[instrument(skip(self, stripe, pending, address), fields(user_id = %user_id))]
    pub async fn confirm_stripe(
        &self,
        user_id: UserId,
        stripe: &StripeClient,
        pending: Option<&PendingPayment>,
        intent_id: &str,
        address: &ShippingAddress,
    ) -> Result<PlacedOrder, CheckoutError> {
        let address = address.validate()?;

        if let Some(placed) = self
            .existing_order(user_id, PaymentMethod::Stripe, intent_id)
            .await?
        {
            return Ok(placed);
        }

        let pending = matching_pending(pending, PaymentMethod::Stripe, intent_id)?;
        let payment = stripe.retrieve_intent(intent_id).await?.to_payment();
        verify_payment(&payment, pending, stripe.currency())?;

        self.place(user_id, pending, address).await
    }

    /// Capture an approved `PayPal` order and place ours.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`]; every variant except `EmptyCart` can occur.
    #[instrument(skip(self, paypal, pending, address), fields(user_id = %user_id))]
    pub async fn capture_paypal(
        &self,
        user_id: UserId,
        paypal: &PaypalClient,
        pending: Option<&PendingPayment>,
        order_id: &str,
        address: &ShippingAddress,
    ) -> Result<PlacedOrder, CheckoutError> {
        let address = address.validate()?;

        if let Some(placed) = self
            .existing_order(user_id, PaymentMethod::Paypal, order_id)
            .await?
        {
            return Ok(placed);
        }

        let pending = matching_pending(pending, PaymentMethod::Paypal, order_id)?;
        let payment = paypal.capture_order(order_id).await?.to_payment()?;
        verify_payment(&payment, pending, paypal.currency())?;

        self.place(user_id, pending, address).await
    }

    /// The order already placed for this payment, if it belongs to `user_id`.
    async fn existing_order(
        &self,
        user_id: UserId,
        method: PaymentMethod,
        provider_id: &str,
    ) -> Result<Option<PlacedOrder>, CheckoutError> {
        let Some(order_id) = self.orders.find_by_payment(method, provider_id).await? else {
            return Ok(None);
        };

        let detail = self
            .orders
            .get_for_user(user_id, order_id)
            .await?
            .ok_or(CheckoutError::PaymentMismatch)?;

        Ok(Some(PlacedOrder {
            detail,
            created: false,
        }))
    }

    /// Write the order for a verified payment.
    ///
    /// Money has been taken by the time this runs, so any failure to match
    /// it to the cart is logged at error level for a manual refund.
    async fn place(
        &self,
        user_id: UserId,
        pending: &PendingPayment,
        address: ShippingAddress,
    ) -> Result<PlacedOrder, CheckoutError> {
        let quote = self.quote(user_id).await?;

        if quote.lines.is_empty() || quote.total != pending.amount {
            error!(
                payment_id = %pending.provider_id,
                paid = %pending.amount,
                quoted = %quote.total,
                "Paid amount no longer matches cart; refund required"
            );
            sentry::capture_message(
                &format!(
                    "Refund required: {} payment {} no longer matches cart",
                    pending.method, pending.provider_id
                ),
                sentry::Level::Error,
            );
            return Err(CheckoutError::CartChanged);
        }

        let order = new_order(user_id, pending, address, &quote);

        let order_id = match self.orders.place(&order).await {
            Ok(PlaceOrder::Created(id)) => id,
            Ok(PlaceOrder::Existing(id)) => {
                return self.load(id, false).await;
            }
            Ok(PlaceOrder::OutOfStock {
                title,
                requested,
                available,
            }) => {
                error!(
                    payment_id = %pending.provider_id,
                    title = %title,
                    requested,
                    available,
                    "Paid order could not be filled; refund required"
                );
                sentry::capture_message(
                    &format!(
                        "Refund required: {} payment {} ran out of stock for {title}",
                        pending.method, pending.provider_id
                    ),
                    sentry::Level::Error,
                );
                return Err(CheckoutError::OutOfStock {
                    title,
                    requested,
                    available,
                });
            }
            Err(RepositoryError::Conflict(_)) => {
                warn!(payment_id = %pending.provider_id, "Concurrent confirmation, returning existing order");
                return self
                    .existing_order(user_id, pending.method, &pending.provider_id)
                    .await?
                    .ok_or(CheckoutError::PaymentMismatch);
            }
            Err(e) => return Err(e.into()),
        };

        self.load(order_id, true).await
    }

    async fn load(
        &self,
        id: OrderId,
        created: bool,
    ) -> Result<PlacedOrder, CheckoutError> {
        let detail = self
            .orders
            .get(id)
            .await?
            .ok_or(CheckoutError::Repository(RepositoryError::NotFound))?;

        Ok(PlacedOrder { detail, created })
    }
}

/// The session's pending payment, if it is for `method` and `provider_id`.
fn matching_pending<'p>(
    pending: Option<&'p PendingPayment>,
    method: PaymentMethod,
    provider_id: &str,
) -> Result<&'p PendingPayment, CheckoutError> {
    let pending = pending.ok_or(CheckoutError::NoPendingPayment)?;

    if pending.method != method || pending.provider_id != provider_id {
        warn!(
            expected = %pending.provider_id,
            got = %provider_id,
            "Payment id does not match session"
        );
        return Err(CheckoutError::PaymentMismatch);
    }

    Ok(pending)
}

/// Check the provider took the quoted amount.
fn verify_payment(
    payment: &ProviderPayment,
    pending: &PendingPayment,
    currency: &str,
) -> Result<(), CheckoutError> {
    if !payment.completed {
        return Err(CheckoutError::PaymentNotCompleted(payment.status.clone()));
    }

    if !payment.matches(pending.amount, currency) {
        error!(
            payment_id = %payment.id,
            expected = %pending.amount,
            got = %payment.amount,
            currency = %payment.currency,
            "Provider amount mismatch"
        );
        return Err(CheckoutError::AmountMismatch);
    }

    Ok(())
}

fn new_order(
    user_id: UserId,
    pending: &PendingPayment,
    shipping_address: ShippingAddress,
    quote: &Quote,
) -> NewOrder {
    NewOrder {
        user_id,
        subtotal: quote.subtotal,
        shipping_cost: quote.shipping,
        total: quote.total,
        status: OrderStatus::Processing,
        payment_method: pending.method,
        payment_id: pending.provider_id.clone(),
        shipping_address,
        items: quote
            .lines
            .iter()
            .map(|l| NewOrderItem {
                game_id: l.game_id,
                title: l.title.clone(),
                quantity: l.quantity,
                price: l.unit_price,
            })
            .collect(),
    }
}

/// Email the receipt in the background. Failures are logged only.
pub fn spawn_confirmation_email(mailer: Option<&EmailService>, user: &User, detail: OrderDetail) {
    let Some(mailer) = mailer.cloned() else {
        tracing::debug!(order_id = %detail.order.id, "Email disabled, skipping confirmation");
        return;
    };

    let to = user.email.to_string();
    let name = user.name.clone();

    tokio::spawn(async move {
        if let Err(e) = mailer.send_order_confirmation(&to, &name, &detail).await {
            warn!(order_id = %detail.order.id, error = %e, "Failed to send order confirmation");
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::cart::tests::line;

    fn quote(lines: &[CartLine]) -> Quote {
        Quote::from_lines(lines, &ShippingConfig::default())
    }

    fn pending() -> PendingPayment {
        PendingPayment {
            method: PaymentMethod::Stripe,
            provider_id: "pi_123".to_owned(),
            amount: Decimal::new(4598, 2),
        }
    }

    fn payment(status: &str, completed: bool, amount: Decimal) -> ProviderPayment {
        ProviderPayment {
            id: "pi_123".to_owned(),
            status: status.to_owned(),
            completed,
            amount,
            currency: "usd".to_owned(),
        }
    }

    #[test]
    fn test_quote_adds_flat_shipping_below_threshold() {
        let q = quote(&[line(1, 10, 2, Decimal::new(1999, 2), 5)]);
        assert_eq!(q.subtotal, Decimal::new(3998, 2));
        assert_eq!(q.shipping, Decimal::new(599, 2));
        assert_eq!(q.total, Decimal::new(4597, 2));
        assert_eq!(q.item_count, 2);
    }

    #[test]
    fn test_quote_free_shipping_at_threshold() {
        let q = quote(&[line(1, 10, 3, Decimal::new(2500, 2), 5)]);
        assert_eq!(q.subtotal, Decimal::new(7500, 2));
        assert_eq!(q.shipping, Decimal::ZERO);
        assert_eq!(q.total, q.subtotal);
    }

    #[test]
    fn test_quote_uses_current_price_not_snapshot() {
        let mut l = line(1, 10, 1, Decimal::new(3000, 2), 5);
        l.current_price = Decimal::new(2000, 2);
        let q = quote(&[l]);
        assert_eq!(q.subtotal, Decimal::new(2000, 2));
    }

    #[test]
    fn test_empty_quote_is_not_purchasable() {
        let q = quote(&[]);
        assert_eq!(q.total, Decimal::ZERO);
        assert!(matches!(q.ensure_purchasable(), Err(CheckoutError::EmptyCart)));
    }

    #[test]
    fn test_out_of_stock_line_blocks_purchase() {
        let q = quote(&[
            line(1, 10, 1, Decimal::ONE, 5),
            line(2, 11, 4, Decimal::ONE, 3),
        ]);
        match q.ensure_purchasable() {
            Err(CheckoutError::OutOfStock {
                requested,
                available,
                ..
            }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
            }
            other => panic!("expected OutOfStock, got {other:?}"),
        }
    }

    #[test]
    fn test_matching_pending_requires_session_payment() {
        assert!(matches!(
            matching_pending(None, PaymentMethod::Stripe, "pi_123"),
            Err(CheckoutError::NoPendingPayment)
        ));
    }

    #[test]
    fn test_matching_pending_rejects_foreign_id() {
        let p = pending();
        assert!(matches!(
            matching_pending(Some(&p), PaymentMethod::Stripe, "pi_someone_else"),
            Err(CheckoutError::PaymentMismatch)
        ));
        assert!(matches!(
            matching_pending(Some(&p), PaymentMethod::Paypal, "pi_123"),
            Err(CheckoutError::PaymentMismatch)
        ));
        assert!(matching_pending(Some(&p), PaymentMethod::Stripe, "pi_123").is_ok());
    }

    #[test]
    fn test_verify_payment_requires_completion() {
        let p = pending();
        assert!(matches!(
            verify_payment(&payment("processing", false, p.amount), &p, "usd"),
            Err(CheckoutError::PaymentNotCompleted(status)) if status == "processing"
        ));
    }

    #[test]
    fn test_verify_payment_requires_exact_amount() {
        let p = pending();
        assert!(matches!(
            verify_payment(&payment("succeeded", true, Decimal::new(100, 2)), &p, "usd"),
            Err(CheckoutError::AmountMismatch)
        ));
        assert!(verify_payment(&payment("succeeded", true, p.amount), &p, "usd").is_ok());
    }

    #[test]
    fn test_new_order_freezes_prices_and_is_processing() {
        let q = quote(&[line(1, 10, 2, Decimal::new(1999, 2), 5)]);
        let order = new_order(
            UserId::new(9),
            &pending(),
            ShippingAddress {
                full_name: "A".to_owned(),
                line1: "B".to_owned(),
                line2: None,
                city: "C".to_owned(),
                state: String::new(),
                postal_code: "D".to_owned(),
                country: "US".to_owned(),
                phone: None,
            },
            &q,
        );

        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_id, "pi_123");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].price, Decimal::new(1999, 2));
        assert_eq!(order.items[0].title, "Game 10");
    }
}
