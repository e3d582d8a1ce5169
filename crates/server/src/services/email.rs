//! Transactional email: order confirmation and welcome messages.
//!
//! Uses SMTP via lettre with Askama templates, sending a plain text and an
//! HTML part. Sends are best-effort: callers use the `spawn_*` helpers,
//! which log failures and never retry.

use std::sync::Arc;

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::{OrderItem, OrderWithItems};

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order: &'a OrderWithItems,
    items: &'a [OrderItem],
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order: &'a OrderWithItems,
    items: &'a [OrderItem],
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeHtml<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    name: &'a str,
    shop_url: &'a str,
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

/// SMTP email sender.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    shop_url: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, shop_url: &str) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_owned(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            shop_url: shop_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Send the order confirmation.
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to render or send.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        name: &str,
        order: &OrderWithItems,
    ) -> Result<(), EmailError> {
        let (html, text) = render_order_confirmation(name, order)?;
        let subject = format!("Your Bazaar order {}", order.order.order_number);
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send the welcome email after registration.
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to render or send.
    pub async fn send_welcome(&self, to: &str, name: &str) -> Result<(), EmailError> {
        let shop_url = self.shop_url.as_str();
        let html = WelcomeHtml { name, shop_url }.render()?;
        let text = WelcomeText { name, shop_url }.render()?;
        self.send_multipart_email(to, "Welcome to Bazaar", &text, &html)
            .await
    }

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
                .map_err(|_| EmailError::InvalidAddress(to.to_owned()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_owned()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_owned()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn render_order_confirmation(
    name: &str,
    order: &OrderWithItems,
) -> Result<(String, String), askama::Error> {
    let items = order.items.as_slice();
    let html = OrderConfirmationHtml { name, order, items }.render()?;
    let text = OrderConfirmationText { name, order, items }.render()?;
    Ok((html, text))
}

/// Send the order confirmation on a detached task.
pub fn spawn_order_confirmation(
    email: Option<Arc<EmailService>>,
    to: String,
    name: String,
    order: OrderWithItems,
) {
    let Some(email) = email else {
        tracing::debug!(
            order_number = %order.order.order_number,
            "Email disabled, skipping order confirmation"
        );
        return;
    };
    tokio::spawn(async move {
        if let Err(e) = email.send_order_confirmation(&to, &name, &order).await {
            tracing::error!(
                error = %e,
                order_number = %order.order.order_number,
                "Failed to send order confirmation"
            );
        }
    });
}

/// Send the welcome email on a detached task.
pub fn spawn_welcome(email: Option<Arc<EmailService>>, to: String, name: String) {
    let Some(email) = email else {
        tracing::debug!("Email disabled, skipping welcome email");
        return;
    };
    tokio::spawn(async move {
        if let Err(e) = email.send_welcome(&to, &name).await {
            tracing::error!(error = %e, "Failed to send welcome email");
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use bazaar_core::{
        OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId,
    };

    use super::*;
    use crate::models::{AddressSnapshot, Order};

    fn order() -> OrderWithItems {
        let now = Utc::now();
        let address = AddressSnapshot {
            recipient: "Ada Shopper".to_owned(),
            line1: "1 Market Street".to_owned(),
            line2: None,
            city: "Springfield".to_owned(),
            state: None,
            postal_code: "12345".to_owned(),
            country: "US".to_owned(),
            phone: None,
        };
        OrderWithItems {
            order: Order {
                id: OrderId::new(1),
                order_number: "ORD-20260301-ABCDEF".to_owned(),
                user_id: UserId::new(1),
                shipping_address: address.clone(),
                billing_address: address,
                subtotal: Decimal::new(4000, 2),
                discount: Decimal::ZERO,
                tax: Decimal::new(400, 2),
                shipping: Decimal::new(1000, 2),
                total: Decimal::new(5400, 2),
                coupon_code: None,
                payment_method: PaymentMethod::Card,
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Pending,
                tracking_number: None,
                notes: None,
                created_at: now,
                updated_at: now,
            },
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(1),
                product_id: ProductId::new(1),
                variant_id: None,
                name: "Teapot".to_owned(),
                sku: "TEA-1".to_owned(),
                unit_price: Decimal::new(2000, 2),
                quantity: 2,
                line_total: Decimal::new(4000, 2),
            }],
        }
    }

    #[test]
    fn test_order_confirmation_renders_items_and_total() {
        let (html, text) = render_order_confirmation("Ada", &order()).unwrap();
        for body in [&html, &text] {
            assert!(body.contains("ORD-20260301-ABCDEF"));
            assert!(body.contains("Teapot"));
            assert!(body.contains("54.00"));
        }
    }

    #[test]
    fn test_welcome_renders_name() {
        let text = WelcomeText {
            name: "Ada",
            shop_url: "https://shop.example.com",
        }
        .render()
        .unwrap();
        assert!(text.contains("Ada"));
        assert!(text.contains("https://shop.example.com"));
    }
}
