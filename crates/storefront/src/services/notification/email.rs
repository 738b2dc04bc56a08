//! SMTP delivery of order confirmations.
//!
//! Uses lettre for delivery with Askama HTML and plain-text templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;

use super::{NotificationError, OrderConfirmation, OrderNotifier};
use crate::config::EmailConfig;

/// One item row as printed in the confirmation.
struct ItemView {
    name: String,
    /// Empty when the product had no image.
    image: String,
    quantity: u16,
    unit_price: String,
    line_total: String,
}

/// HTML template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order_id: i64,
    payment_method: &'a str,
    items: &'a [ItemView],
    total: &'a str,
    order_url: &'a str,
}

/// Plain text template for the order confirmation email.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order_id: i64,
    payment_method: &'a str,
    items: &'a [ItemView],
    total: &'a str,
    order_url: &'a str,
}

/// Sends order confirmations over SMTP.
#[derive(Clone)]
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    base_url: String,
}

impl EmailNotifier {
    /// Create a notifier from configuration.
    ///
    /// `base_url` is used to link the customer to the order page.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, base_url: &str) -> Result<Self, SmtpError> {
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
        })
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), NotificationError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotificationError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| NotificationError::InvalidAddress(to.to_string()))?)
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

/// Render both bodies of a confirmation, returning `(subject, text, html)`.
fn render(
    confirmation: &OrderConfirmation,
    base_url: &str,
) -> Result<(String, String, String), NotificationError> {
    let order = &confirmation.order;
    let items: Vec<ItemView> = order
        .items
        .iter()
        .map(|item| ItemView {
            name: item.product_name.clone(),
            image: item.product_image.clone().unwrap_or_default(),
            quantity: item.quantity.get(),
            unit_price: item.unit_price.to_string(),
            line_total: item.line_total().to_string(),
        })
        .collect();
    let total = order.total.to_string();
    let order_url = format!("{base_url}/orders/{}", order.id);
    let order_id = order.id.as_i64();
    let payment_method = order.payment_method.display_name();
    let name = confirmation.recipient_name.as_str();

    let html = OrderConfirmationHtml {
        name,
        order_id,
        payment_method,
        items: &items,
        total: &total,
        order_url: &order_url,
    }
    .render()?;
    let text = OrderConfirmationText {
        name,
        order_id,
        payment_method,
        items: &items,
        total: &total,
        order_url: &order_url,
    }
    .render()?;

    Ok((format!("Quitanda: encomenda #{order_id} confirmada"), text, html))
}

impl OrderNotifier for EmailNotifier {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotificationError> {
        let (subject, text, html) = render(confirmation, &self.base_url)?;
        self.send_multipart_email(&confirmation.recipient_email, &subject, &text, &html)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use quitanda_core::{
        Money, OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, Quantity, UserId,
    };

    use super::*;
    use crate::models::{Order, OrderItem};

    fn confirmation() -> OrderConfirmation {
        OrderConfirmation {
            recipient_name: "Ana".to_owned(),
            recipient_email: "ana@example.com".to_owned(),
            order: Order {
                id: OrderId::new(42),
                user_id: UserId::new(1),
                total: Money::from_cents(129_000),
                status: OrderStatus::Confirmed,
                payment_method: PaymentMethod::Mpesa,
                created_at: Utc::now(),
                items: vec![OrderItem {
                    id: OrderItemId::new(1),
                    order_id: OrderId::new(42),
                    product_id: ProductId::new(3),
                    product_name: "Manga".to_owned(),
                    product_image: None,
                    quantity: Quantity::new(3).unwrap(),
                    unit_price: Money::from_cents(43_000),
                }],
            },
        }
    }

    #[test]
    fn test_render_includes_order_details() {
        let (subject, text, html) = render(&confirmation(), "https://quitanda.example").unwrap();

        assert!(subject.contains("#42"));
        for body in [&text, &html] {
            assert!(body.contains("Ana"));
            assert!(body.contains("Manga"));
            assert!(body.contains("430,00 MT"));
            assert!(body.contains("1.290,00 MT"));
            assert!(body.contains("M-Pesa"));
            assert!(body.contains("https://quitanda.example/orders/42"));
        }
    }
}
