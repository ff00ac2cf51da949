//! Order confirmation mailer.
//!
//! Fire-and-forget: a failed confirmation email is logged and never fails
//! the order flow. The mailer is optional; without SMTP configuration the
//! service runs silently without it.

use lettre::message::header::ContentType;
use lettre::transport::smtp::Error as SmtpError;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use tangelo_core::Email;
use thiserror::Error;

use crate::config::SmtpConfig;
use crate::models::{Order, OrderLine};

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailerError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
}

/// SMTP mailer for transactional store email.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl Mailer {
    /// Create a new mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    /// Send an order confirmation to the buyer.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or handed to the relay.
    pub async fn send_order_confirmation(
        &self,
        to: &Email,
        order: &Order,
        lines: &[OrderLine],
    ) -> Result<(), MailerError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| MailerError::InvalidAddress(format!("{e}")))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|e| MailerError::InvalidAddress(format!("{e}")))?)
            .subject(format!("Order {} confirmed", order.order_number))
            .header(ContentType::TEXT_PLAIN)
            .body(confirmation_body(order, lines))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

fn confirmation_body(order: &Order, lines: &[OrderLine]) -> String {
    use std::fmt::Write;

    let mut body = format!(
        "Thanks for your order!\n\nOrder number: {}\n\nItems:\n",
        order.order_number
    );
    for line in lines {
        let _ = writeln!(
            body,
            "  {} x{} - {} {}",
            line.product_name,
            line.quantity,
            line.subtotal,
            order.currency.code()
        );
    }
    let _ = write!(
        body,
        "\nTotal: {} {}\n",
        order.total,
        order.currency.code()
    );
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tangelo_core::{
        CurrencyCode, CustomerId, OrderId, OrderLineId, OrderStatus, PaymentMethod, PaymentStatus,
        ProductId,
    };

    #[test]
    fn test_confirmation_body_lists_lines_and_total() {
        let order = Order {
            id: OrderId::new(1),
            order_number: "ORD-20260315-AB12CD".to_string(),
            customer_id: CustomerId::new(1),
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Approved,
            payment_method: PaymentMethod::Card,
            external_payment_id: None,
            subtotal: Decimal::new(5000, 2),
            total: Decimal::new(5000, 2),
            currency: CurrencyCode::USD,
            paid_at: Some(Utc::now()),
            created_at: Utc::now(),
        };
        let lines = vec![OrderLine {
            id: OrderLineId::new(1),
            order_id: order.id,
            product_id: ProductId::new(1),
            product_name: "Ceramic Mug".to_string(),
            variant: None,
            quantity: 2,
            unit_price: Decimal::new(2500, 2),
            subtotal: Decimal::new(5000, 2),
        }];

        let body = confirmation_body(&order, &lines);
        assert!(body.contains("ORD-20260315-AB12CD"));
        assert!(body.contains("Ceramic Mug x2"));
        assert!(body.contains("Total: 50.00 USD"));
    }
}
