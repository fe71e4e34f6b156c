//! Transactional email: order confirmations and shipping notices.
//!
//! Uses SMTP via lettre for delivery with Askama templates. Callers treat
//! sending as best effort; a failed email never fails the request that
//! triggered it.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use retro_vault_core::{OrderId, ShippingAddress, money};

use crate::config::EmailConfig;
use crate::models::order::{Order, OrderDetail};

/// One purchased line, pre-formatted for display.
struct LineView {
    title: String,
    quantity: i32,
    price: String,
    total: String,
}

/// Everything an order confirmation shows.
struct ConfirmationView {
    name: String,
    order_id: OrderId,
    lines: Vec<LineView>,
    subtotal: String,
    shipping: String,
    total: String,
    address_lines: Vec<String>,
    order_url: String,
}

struct ShippedView<'a> {
    name: &'a str,
    order_id: OrderId,
    carrier: Option<&'a str>,
    tracking_number: Option<&'a str>,
    order_url: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    email: &'a ConfirmationView,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    email: &'a ConfirmationView,
}

#[derive(Template)]
#[template(path = "email/order_shipped.html")]
struct OrderShippedHtml<'a> {
    email: &'a ShippedView<'a>,
}

#[derive(Template)]
#[template(path = "email/order_shipped.txt")]
struct OrderShippedText<'a> {
    email: &'a ShippedView<'a>,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    base_url: String,
    currency: String,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay address is invalid.
    pub fn new(config: &EmailConfig, base_url: &str, currency: &str) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            currency: currency.to_uppercase(),
        })
    }

    /// Send the receipt for a newly placed order.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        name: &str,
        detail: &OrderDetail,
    ) -> Result<(), EmailError> {
        let view = confirmation_view(name, detail, &self.currency, &self.base_url);
        let html = OrderConfirmationHtml { email: &view }.render()?;
        let text = OrderConfirmationText { email: &view }.render()?;

        self.send_multipart_email(
            to,
            &format!("Retro Vault order #{} confirmed", detail.order.id),
            &text,
            &html,
        )
        .await
    }

    /// Tell the customer their order has shipped.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_shipping_notice(
        &self,
        to: &str,
        name: &str,
        order: &Order,
    ) -> Result<(), EmailError> {
        let view = shipped_view(name, order, &self.base_url);
        let html = OrderShippedHtml { email: &view }.render()?;
        let text = OrderShippedText { email: &view }.render()?;

        self.send_multipart_email(
            to,
            &format!("Retro Vault order #{} has shipped", order.id),
            &text,
            &html,
        )
        .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn price(amount: Decimal, currency: &str) -> String {
    format!("{} {currency}", money::format_amount(amount))
}

fn order_url(base_url: &str, id: OrderId) -> String {
    format!("{base_url}/account/orders/{id}")
}

fn address_lines(address: &ShippingAddress) -> Vec<String> {
    let locality = [address.city.as_str(), address.state.as_str(), address.postal_code.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    [
        Some(address.full_name.clone()),
        Some(address.line1.clone()),
        address.line2.clone(),
        Some(locality),
        Some(address.country.clone()),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn confirmation_view(
    name: &str,
    detail: &OrderDetail,
    currency: &str,
    base_url: &str,
) -> ConfirmationView {
    let order = &detail.order;
    ConfirmationView {
        name: name.to_owned(),
        order_id: order.id,
        lines: detail
            .items
            .iter()
            .map(|item| LineView {
                title: item.title.clone(),
                quantity: item.quantity,
                price: price(item.price, currency),
                total: price(item.line_total(), currency),
            })
            .collect(),
        subtotal: price(order.subtotal, currency),
        shipping: if order.shipping_cost.is_zero() {
            "Free".to_owned()
        } else {
            price(order.shipping_cost, currency)
        },
        total: price(order.total, currency),
        address_lines: address_lines(&order.shipping_address),
        order_url: order_url(base_url, order.id),
    }
}

fn shipped_view<'a>(name: &'a str, order: &'a Order, base_url: &str) -> ShippedView<'a> {
    ShippedView {
        name,
        order_id: order.id,
        carrier: order.shipping_carrier.as_deref(),
        tracking_number: order.tracking_number.as_deref(),
        order_url: order_url(base_url, order.id),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use retro_vault_core::{GameId, OrderItemId, OrderStatus, PaymentMethod, UserId};

    use super::*;
    use crate::models::order::OrderItem;

    fn detail() -> OrderDetail {
        let now = Utc::now();
        OrderDetail {
            order: Order {
                id: OrderId::new(42),
                user_id: Some(UserId::new(1)),
                subtotal: Decimal::new(8000, 2),
                shipping_cost: Decimal::ZERO,
                total: Decimal::new(8000, 2),
                status: OrderStatus::Processing,
                payment_method: PaymentMethod::Stripe,
                payment_id: "pi_1".to_owned(),
                shipping_address: ShippingAddress {
                    full_name: "Link <Hero>".to_owned(),
                    line1: "1 Kokiri Forest".to_owned(),
                    line2: None,
                    city: "Hyrule".to_owned(),
                    state: String::new(),
                    postal_code: "12345".to_owned(),
                    country: "US".to_owned(),
                    phone: None,
                },
                shipping_carrier: Some("UPS".to_owned()),
                tracking_number: Some("1Z999".to_owned()),
                shipped_at: None,
                delivered_at: None,
                created_at: now,
                updated_at: now,
            },
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                game_id: Some(GameId::new(7)),
                title: "Chrono Trigger".to_owned(),
                quantity: 2,
                price: Decimal::new(4000, 2),
            }],
        }
    }

    #[test]
    fn test_confirmation_renders_lines_and_totals() {
        let detail = detail();
        let view = confirmation_view("Link", &detail, "USD", "https://shop.test");
        let text = OrderConfirmationText { email: &view }.render().unwrap();

        assert!(text.contains("order #42"));
        assert!(text.contains("2 x Chrono Trigger @ 40.00 USD = 80.00 USD"));
        assert!(text.contains("Shipping: Free"));
        assert!(text.contains("https://shop.test/account/orders/42"));
    }

    #[test]
    fn test_confirmation_html_escapes_user_input() {
        let detail = detail();
        let view = confirmation_view("Link", &detail, "USD", "https://shop.test");
        let html = OrderConfirmationHtml { email: &view }.render().unwrap();

        assert!(html.contains("Link &#60;Hero&#62;") || html.contains("Link &lt;Hero&gt;"));
        assert!(!html.contains("<Hero>"));
    }

    #[test]
    fn test_shipping_notice_includes_tracking() {
        let detail = detail();
        let view = shipped_view("Link", &detail.order, "https://shop.test");
        let text = OrderShippedText { email: &view }.render().unwrap();

        assert!(text.contains("Carrier: UPS"));
        assert!(text.contains("Tracking number: 1Z999"));
    }

    #[test]
    fn test_address_lines_skip_empty_parts() {
        let lines = address_lines(&detail().order.shipping_address);
        assert_eq!(
            lines,
            vec!["Link <Hero>", "1 Kokiri Forest", "Hyrule 12345", "US"]
        );
    }
}
