//! Checkout: stock validation, payment dispatch, and order creation.
//!
//! Two flows with deliberately different shapes:
//!
//! - **Synchronous** (card, transfer, cash on delivery): the gateway is
//!   called first, with nothing persisted; on approval the order and the
//!   stock deduction commit together in one transaction. The sync path
//!   deducts on-hand directly (no reserve step) - the row lock inside that
//!   transaction already serializes it against every other stock writer.
//! - **Asynchronous** (hosted checkout): the pending order and the
//!   reservation commit *before* the gateway call, so no lock is held
//!   across the network round-trip. A gateway failure afterwards leaves the
//!   pending order in place for the reaper.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tangelo_core::{
    LedgerError, Money, MovementKind, OrderId, OrderStatus, PaymentMethod, PaymentStatus,
    ProductId, StockLevels,
};
use thiserror::Error;
use tracing::warn;

use super::mailer::Mailer;
use super::payments::{
    PaymentDispatcher, PaymentError, PaymentIntent, PaymentOutcome, PreferenceItem,
};
use super::webhook::{ReconcileError, WebhookReconciler};
use crate::config::StoreConfig;
use crate::db::inventory::{self, InventoryError, LedgerOp};
use crate::db::orders::{self, PaymentUpsert};
use crate::db::{RepositoryError, products};
use crate::models::order::generate_order_number;
use crate::models::{Customer, NewOrder, NewOrderLine, Order, OrderOutcome};
use crate::state::AppState;

/// One requested line of a checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: i32,
    /// Optional variant selectors (size, color, ...), stored verbatim.
    #[serde(default)]
    pub variant: Option<serde_json::Value>,
}

/// A checkout request after the customer has been resolved.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub lines: Vec<CheckoutLine>,
    pub payment_method: PaymentMethod,
    pub card_token: Option<String>,
}

/// Failures a checkout caller can branch on.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Stock rule violation; correct the cart and retry.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A requested product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Order missing, or owned by someone else (reported identically).
    #[error("order not found")]
    OrderNotFound,

    /// The gateway definitively said no.
    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    /// The gateway was unreachable; re-initiating checkout is safe.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<PaymentError> for CheckoutError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Declined(reason) => Self::PaymentDeclined(reason),
            PaymentError::Gateway(reason) => Self::GatewayUnavailable(reason),
        }
    }
}

impl From<InventoryError> for CheckoutError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::Ledger(e) => Self::Ledger(e),
            InventoryError::Repository(e) => Self::Repository(e),
        }
    }
}

impl From<ReconcileError> for CheckoutError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::Repository(e) => Self::Repository(e),
            ReconcileError::Inventory(e) => e.into(),
            ReconcileError::InvalidTransition { from, to } => Self::Repository(
                RepositoryError::Conflict(format!("order cannot move from {from} to {to}")),
            ),
        }
    }
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// A validated line with its product snapshot and current stock levels.
struct ResolvedLine {
    new_line: NewOrderLine,
    levels: StockLevels,
}

/// Drives the two checkout flows.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    payments: &'a PaymentDispatcher,
    mailer: Option<&'a Mailer>,
    config: &'a StoreConfig,
}

impl<'a> CheckoutService<'a> {
    /// Create a checkout service borrowing from the application state.
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            pool: state.pool(),
            payments: state.payments(),
            mailer: state.mailer(),
            config: state.config(),
        }
    }

    /// Run a checkout for a resolved customer.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] distinguishing stock violations, declined
    /// payments, and gateway unavailability; see the module docs for what
    /// survives each failure.
    pub async fn checkout(
        &self,
        customer: &Customer,
        request: CheckoutRequest,
    ) -> Result<OrderOutcome, CheckoutError> {
        let resolved = self.resolve_lines(&request).await?;
        let subtotal: Decimal = resolved.iter().map(|l| l.new_line.subtotal).sum();

        if request.payment_method.is_asynchronous() {
            self.checkout_async(customer, resolved, subtotal).await
        } else {
            self.checkout_sync(customer, &request, resolved, subtotal)
                .await
        }
    }

    /// Confirm an asynchronous order when the buyer returns from the
    /// gateway, by querying the gateway's status endpoint and reconciling.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` for unknown orders and for
    /// ownership mismatches (deliberately indistinguishable), and gateway or
    /// repository failures otherwise.
    pub async fn confirm_return(
        &self,
        customer: &Customer,
        order_id: OrderId,
        external_payment_id: &str,
    ) -> Result<OrderOutcome, CheckoutError> {
        let order = orders::get(self.pool, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        if order.customer_id != customer.id {
            // Do not leak existence of other customers' orders.
            return Err(CheckoutError::OrderNotFound);
        }

        let (status, raw_payload) = self.payments.query_status(external_payment_id).await?;

        let reconciler = WebhookReconciler::new(self.pool, self.mailer);
        let fresh = reconciler
            .reconcile_order(order.id, external_payment_id, status, raw_payload)
            .await?;

        Ok(OrderOutcome::from_order(&fresh, None))
    }

    /// Snapshot products and current stock for every requested line.
    async fn resolve_lines(
        &self,
        request: &CheckoutRequest,
    ) -> Result<Vec<ResolvedLine>, CheckoutError> {
        let mut resolved = Vec::with_capacity(request.lines.len());

        for line in &request.lines {
            if line.quantity <= 0 {
                return Err(LedgerError::InvalidQuantity(line.quantity).into());
            }

            let product = products::get(self.pool, line.product_id)
                .await?
                .ok_or(CheckoutError::ProductNotFound(line.product_id))?;

            // A product without a ledger record is validated against its
            // legacy stock seed; the record itself materializes inside the
            // ledger transaction.
            let levels = match inventory::get(self.pool, line.product_id).await? {
                Some(record) => record.levels,
                None => StockLevels::new(product.legacy_stock, 0),
            };

            let subtotal = product.unit_price * Decimal::from(line.quantity);
            resolved.push(ResolvedLine {
                new_line: NewOrderLine {
                    product_id: product.id,
                    product_name: product.name,
                    variant: line.variant.clone(),
                    quantity: line.quantity,
                    unit_price: product.unit_price,
                    subtotal,
                },
                levels,
            });
        }

        Ok(resolved)
    }

    /// Synchronous flow: charge first, then commit order + stock together.
    async fn checkout_sync(
        &self,
        customer: &Customer,
        request: &CheckoutRequest,
        resolved: Vec<ResolvedLine>,
        subtotal: Decimal,
    ) -> Result<OrderOutcome, CheckoutError> {
        // Dry-run the deduction before charging anyone's card. The definitive
        // check happens again under the row lock below.
        for line in &resolved {
            line.levels.reduce(line.new_line.quantity)?;
        }

        let order_number = generate_order_number(Utc::now());
        let total = subtotal; // no tax policy configured

        let outcome = self
            .payments
            .process(
                PaymentIntent {
                    description: format!("Order {order_number}"),
                    amount: Money::new(total, self.config.currency),
                    card_token: request.card_token.as_deref(),
                    order: None,
                    items: Vec::new(),
                },
                request.payment_method,
            )
            .await?;
        // From here the charge is settled: the transaction below must only
        // fail for stock raced away since the dry-run, which surfaces as a
        // rejected checkout.

        let mut tx = self.pool.begin().await?;
        let order = orders::create(
            &mut tx,
            &NewOrder {
                order_number: order_number.clone(),
                customer_id: customer.id,
                payment_method: request.payment_method,
                external_payment_id: outcome.external_id.clone(),
                subtotal,
                total,
                currency: self.config.currency,
                lines: resolved.into_iter().map(|l| l.new_line).collect(),
            },
        )
        .await?;

        let lines = orders::lines(&mut *tx, order.id).await?;
        for line in &lines {
            inventory::apply(
                &mut tx,
                line.product_id,
                Some(customer.id),
                LedgerOp::Reduce(line.quantity),
                MovementKind::Out,
                &format!("sale for order {order_number}"),
            )
            .await?;
        }

        orders::transition(&mut tx, order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await?;
        let now = Utc::now();
        orders::set_payment_status(
            &mut tx,
            order.id,
            PaymentStatus::Approved,
            outcome.external_id.as_deref(),
            Some(now),
        )
        .await?;
        orders::upsert_payment(
            &mut tx,
            &PaymentUpsert {
                order_id: order.id,
                amount: total,
                method: request.payment_method,
                status: PaymentStatus::Approved,
                external_payment_id: outcome.external_id.clone(),
                gateway_reference: None,
                card_brand: outcome.card_brand.clone(),
                card_last4: outcome.card_last4.clone(),
                raw_payload: Some(outcome.raw_payload.clone()),
                paid_at: Some(now),
            },
        )
        .await?;
        tx.commit().await?;

        let fresh = orders::get(self.pool, order.id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        self.spawn_confirmation(customer, &fresh);

        Ok(OrderOutcome::from_order(&fresh, None))
    }

    /// Asynchronous flow: commit order + reservation, then call the gateway.
    async fn checkout_async(
        &self,
        customer: &Customer,
        resolved: Vec<ResolvedLine>,
        subtotal: Decimal,
    ) -> Result<OrderOutcome, CheckoutError> {
        // Dry-run against `available` so an obviously doomed reservation
        // fails before any write.
        for line in &resolved {
            line.levels.reserve(line.new_line.quantity)?;
        }

        let order_number = generate_order_number(Utc::now());
        let total = subtotal;

        let mut tx = self.pool.begin().await?;
        let order = orders::create(
            &mut tx,
            &NewOrder {
                order_number: order_number.clone(),
                customer_id: customer.id,
                payment_method: PaymentMethod::Gateway,
                external_payment_id: None,
                subtotal,
                total,
                currency: self.config.currency,
                lines: resolved.into_iter().map(|l| l.new_line).collect(),
            },
        )
        .await?;

        let lines = orders::lines(&mut *tx, order.id).await?;
        for line in &lines {
            inventory::apply(
                &mut tx,
                line.product_id,
                Some(customer.id),
                LedgerOp::Reserve(line.quantity),
                MovementKind::Adjust,
                &format!("reservation for order {order_number}"),
            )
            .await?;
        }
        tx.commit().await?;

        // The reservation is committed; the gateway call happens without any
        // lock held. If it fails, the pending order stays for the reaper.
        let items = lines
            .iter()
            .map(|l| PreferenceItem {
                title: l.product_name.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();
        let outcome = match self
            .payments
            .process(
                PaymentIntent {
                    description: format!("Order {order_number}"),
                    amount: Money::new(total, self.config.currency),
                    card_token: None,
                    order: Some(&order),
                    items,
                },
                PaymentMethod::Gateway,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    order = %order_number,
                    error = %e,
                    "gateway failed after reservation; leaving pending order for the reaper"
                );
                return Err(e.into());
            }
        };

        self.record_preference(&order, &outcome).await?;

        let fresh = orders::get(self.pool, order.id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        Ok(OrderOutcome::from_order(&fresh, outcome.redirect_url))
    }

    /// Store the gateway reference for a freshly created preference.
    async fn record_preference(
        &self,
        order: &Order,
        outcome: &PaymentOutcome,
    ) -> Result<(), CheckoutError> {
        let mut tx = self.pool.begin().await?;
        orders::set_payment_status(
            &mut tx,
            order.id,
            PaymentStatus::Pending,
            outcome.external_id.as_deref(),
            None,
        )
        .await?;
        orders::upsert_payment(
            &mut tx,
            &PaymentUpsert {
                order_id: order.id,
                amount: order.total,
                method: order.payment_method,
                status: PaymentStatus::Pending,
                external_payment_id: outcome.external_id.clone(),
                gateway_reference: outcome.external_id.clone(),
                card_brand: None,
                card_last4: None,
                raw_payload: Some(outcome.raw_payload.clone()),
                paid_at: None,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Fire-and-forget order confirmation email.
    fn spawn_confirmation(&self, customer: &Customer, order: &Order) {
        let Some(mailer) = self.mailer else { return };

        let mailer = mailer.clone();
        let recipient = customer.email.clone();
        let order = order.clone();
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let lines = match orders::lines(&pool, order.id).await {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(order = %order.order_number, error = %e, "line lookup failed");
                    return;
                }
            };
            if let Err(e) = mailer
                .send_order_confirmation(&recipient, &order, &lines)
                .await
            {
                warn!(order = %order.order_number, error = %e, "confirmation email failed");
            }
        });
    }
}
