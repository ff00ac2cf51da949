//! Order aggregate: header, lines, state history, and payment record.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use rust_decimal::Decimal;
use serde::Serialize;
use tangelo_core::{
    CurrencyCode, CustomerId, OrderId, OrderLineId, OrderStatus, PaymentMethod, PaymentStatus,
    ProductId,
};

/// The order header.
///
/// `subtotal` and `total` are fixed at creation time from the line snapshots
/// and never recomputed afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Externally visible unique reference (e.g. `ORD-20260315-7Q2X4N`).
    pub order_number: String,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    /// Gateway-side reference for asynchronous payments.
    pub external_payment_id: Option<String>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A line item with its price snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Product name at the time of purchase.
    pub product_name: String,
    /// Optional variant selectors (size, color, ...).
    pub variant: Option<serde_json::Value>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// One entry of the append-only order state history.
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub order_id: OrderId,
    /// `None` for the creation entry.
    pub previous: Option<OrderStatus>,
    pub next: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

/// The order's payment record (at most one per order).
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecord {
    pub order_id: OrderId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub external_payment_id: Option<String>,
    pub gateway_reference: Option<String>,
    /// Display snapshot only; never used to charge.
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    /// Raw gateway payload, kept verbatim for audits.
    pub raw_payload: Option<serde_json::Value>,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an order together with its lines.
///
/// Orders always start in `Pending`/`Pending`; later states are reached
/// through recorded transitions, never set at insert time.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_id: CustomerId,
    pub payment_method: PaymentMethod,
    pub external_payment_id: Option<String>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub lines: Vec<NewOrderLine>,
}

/// Input for one order line.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub variant: Option<serde_json::Value>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// What a checkout (or buyer-return confirmation) hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct OrderOutcome {
    pub order_id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Where to send the buyer for a redirect-based payment.
    pub redirect_url: Option<String>,
    pub external_payment_id: Option<String>,
}

impl OrderOutcome {
    /// Build an outcome from a persisted order.
    #[must_use]
    pub fn from_order(order: &Order, redirect_url: Option<String>) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            status: order.status,
            payment_status: order.payment_status,
            redirect_url,
            external_payment_id: order.external_payment_id.clone(),
        }
    }
}

/// Generate an externally visible order number: `ORD-<date>-<6 alphanumerics>`.
///
/// Uniqueness is ultimately enforced by the database constraint; the random
/// suffix makes collisions within a day vanishingly rare.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_order_number_shape() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let number = generate_order_number(now);

        assert!(number.starts_with("ORD-20260315-"));
        assert_eq!(number.len(), "ORD-20260315-".len() + 6);
        assert!(
            number
                .rsplit('-')
                .next()
                .unwrap()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_lowercase())
        );
    }

    #[test]
    fn test_order_numbers_differ() {
        let now = Utc::now();
        assert_ne!(generate_order_number(now), generate_order_number(now));
    }
}
