//! Order confirmation email delivery.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use marram_goods_core::{Email, PaymentMethod};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::SmtpConfig;
use crate::filters;
use crate::models::order::{NewOrderLine, Order};

/// HTML template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a Order,
    lines: &'a [NewOrderLine],
    payment_label: &'static str,
}

/// Plain text template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a Order,
    lines: &'a [NewOrderLine],
    payment_label: &'static str,
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
    from_mailbox: String,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("from_mailbox", &self.from_mailbox)
            .finish_non_exhaustive()
    }
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_mailbox: format!("{} <{}>", config.from_name, config.from_address),
        })
    }

    /// Send the order confirmation for a freshly committed order.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or a template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &Email,
        order: &Order,
        lines: &[NewOrderLine],
    ) -> Result<(), EmailError> {
        let payment_label = match order.payment_method {
            PaymentMethod::Direct => "Pay on delivery",
            PaymentMethod::Gateway => "Paid online",
        };

        let html = OrderConfirmationHtml {
            order,
            lines,
            payment_label,
        }
        .render()?;
        let text = OrderConfirmationText {
            order,
            lines,
            payment_label,
        }
        .render()?;

        let subject = format!("Your Marram Goods order {}", order.token);
        self.send_multipart_email(to.as_str(), &subject, &text, &html)
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
                self.from_mailbox
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_mailbox.clone()))?,
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use marram_goods_core::{
        FulfillmentStatus, ItemRef, OrderId, OwnerId, PaymentStatus, ProductId,
    };
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;

    fn sample_order() -> Order {
        Order {
            id: OrderId::new(1),
            token: "MG-7F3KQ2XN".to_string(),
            owner_id: OwnerId::from(Uuid::new_v4()),
            customer_email: Some("jo@example.com".parse().unwrap()),
            subtotal: Decimal::new(20000, 2),
            discount: Decimal::new(2000, 2),
            shipping: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::new(18000, 2),
            coupon_code: Some("SAVE10".to_string()),
            payment_method: PaymentMethod::Gateway,
            payment_status: PaymentStatus::Paid,
            fulfillment_status: FulfillmentStatus::Pending,
            gateway_order_id: Some("order_abc".to_string()),
            gateway_payment_id: Some("pay_abc".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_lines() -> Vec<NewOrderLine> {
        vec![NewOrderLine {
            item: ItemRef::Simple(ProductId::new(1)),
            display_name: "Dune Tee".to_string(),
            unit_price: Decimal::new(10000, 2),
            quantity: 2,
            line_total: Decimal::new(20000, 2),
        }]
    }

    #[test]
    fn test_order_confirmation_templates_render() {
        let order = sample_order();
        let lines = sample_lines();

        let html = OrderConfirmationHtml {
            order: &order,
            lines: &lines,
            payment_label: "Paid online",
        }
        .render()
        .unwrap();
        assert!(html.contains("MG-7F3KQ2XN"));
        assert!(html.contains("Dune Tee"));
        assert!(html.contains("180.00"));

        let text = OrderConfirmationText {
            order: &order,
            lines: &lines,
            payment_label: "Paid online",
        }
        .render()
        .unwrap();
        assert!(text.contains("MG-7F3KQ2XN"));
        assert!(text.contains("Paid online"));
        assert!(text.contains("180.00"));
    }
}
