//! Webhook reconciliation for asynchronous payments.
//!
//! Gateway notifications arrive duplicated and out of order. The only
//! ordering safeguard is the forward-only payment state machine: [`plan`]
//! turns (current payment state, reported gateway status) into an action,
//! and anything that does not advance the payment state is a no-op. All
//! stock and state changes for one notification commit in a single
//! transaction, under the order's row lock.

use sqlx::{PgConnection, PgPool};
use tangelo_core::{MovementKind, OrderId, OrderStatus, PaymentStatus};
use thiserror::Error;
use tracing::{info, warn};

use super::mailer::Mailer;
use super::payments::GatewayStatus;
use crate::db::inventory::{self, InventoryError, LedgerOp};
use crate::db::orders::{self, PaymentUpsert};
use crate::db::{RepositoryError, customers};
use crate::models::Order;

/// What a notification should do to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Duplicate or out-of-order notification; apply nothing.
    Ignore,
    /// Buyer is mid-payment at the gateway; no stock change.
    MarkProcessing,
    /// Payment settled: turn the reservation into a sale.
    ConfirmSale,
    /// Payment failed: give the reservation back.
    CancelAndRelease,
    /// Settled payment reversed: put the sold units back on hand.
    RefundAndRestock,
}

/// Decide what a gateway status means for an order in a given payment state.
///
/// Pure so the idempotency rules can be tested exhaustively: replaying an
/// `approved` notification against an already-approved payment plans
/// `Ignore`, as does any status whose target state would move the payment
/// backward.
#[must_use]
pub fn plan(current: PaymentStatus, incoming: GatewayStatus) -> ReconcileAction {
    if !current.can_advance_to(incoming.target_payment_status()) {
        return ReconcileAction::Ignore;
    }

    match incoming {
        GatewayStatus::Approved => ReconcileAction::ConfirmSale,
        GatewayStatus::Pending | GatewayStatus::InProcess => ReconcileAction::MarkProcessing,
        GatewayStatus::Rejected | GatewayStatus::Cancelled => ReconcileAction::CancelAndRelease,
        GatewayStatus::Refunded => ReconcileAction::RefundAndRestock,
    }
}

/// Errors while applying a notification.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The payment state allows the move but the order state does not.
    #[error("order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

impl From<sqlx::Error> for ReconcileError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Drives orders and the stock ledger to a consistent state from gateway
/// notifications.
pub struct WebhookReconciler<'a> {
    pool: &'a PgPool,
    mailer: Option<&'a Mailer>,
}

impl<'a> WebhookReconciler<'a> {
    /// Create a new reconciler.
    #[must_use]
    pub const fn new(pool: &'a PgPool, mailer: Option<&'a Mailer>) -> Self {
        Self { pool, mailer }
    }

    /// Consume one gateway notification.
    ///
    /// Never returns an error: the HTTP handler must always acknowledge, or
    /// the gateway retries into a storm. Unknown statuses, unknown external
    /// ids, and internal failures are logged and swallowed.
    pub async fn process_notification(
        &self,
        external_id: &str,
        raw_status: &str,
        raw_payload: serde_json::Value,
    ) {
        let status = match raw_status.parse::<GatewayStatus>() {
            Ok(status) => status,
            Err(e) => {
                warn!(external_id, "discarding notification: {e}");
                return;
            }
        };

        let result = async {
            let mut tx = self.pool.begin().await?;
            let Some(order) = orders::lock_by_external_payment_id(&mut tx, external_id).await?
            else {
                warn!(external_id, "discarding notification: no matching order");
                return Ok::<Option<Order>, ReconcileError>(None);
            };

            let applied =
                apply_locked(&mut tx, &order, external_id, status, &raw_payload).await?;
            tx.commit().await?;

            if applied == ReconcileAction::Ignore {
                return Ok(None);
            }
            Ok(orders::get(self.pool, order.id).await?)
        }
        .await;

        match result {
            Ok(Some(order)) => {
                info!(
                    order = %order.order_number,
                    status = %order.status,
                    payment = %order.payment_status,
                    "notification reconciled"
                );
                if order.status == OrderStatus::Confirmed {
                    self.send_confirmation(&order).await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                // Acknowledged anyway; the gateway will redeliver and the
                // idempotent planner will pick up from the committed state.
                tracing::error!(external_id, error = %e, "failed to reconcile notification");
            }
        }
    }

    /// Reconcile a specific order against a known gateway status.
    ///
    /// Used by the buyer-return path, which queried the gateway itself.
    /// Shares the planner with the webhook path, so it is just as
    /// idempotent.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError` if the order vanished or a stock or state
    /// change failed; the transaction is rolled back.
    pub async fn reconcile_order(
        &self,
        order_id: OrderId,
        external_id: &str,
        status: GatewayStatus,
        raw_payload: serde_json::Value,
    ) -> Result<Order, ReconcileError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock(&mut tx, order_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let applied = apply_locked(&mut tx, &order, external_id, status, &raw_payload).await?;
        tx.commit().await?;

        let fresh = orders::get(self.pool, order_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if applied != ReconcileAction::Ignore && fresh.status == OrderStatus::Confirmed {
            self.send_confirmation(&fresh).await;
        }

        Ok(fresh)
    }

    /// Fire-and-forget order confirmation email.
    async fn send_confirmation(&self, order: &Order) {
        let Some(mailer) = self.mailer else { return };

        let recipient = match customers::get(self.pool, order.customer_id).await {
            Ok(Some(customer)) => customer.email,
            Ok(None) => {
                warn!(order = %order.order_number, "no customer for confirmation email");
                return;
            }
            Err(e) => {
                warn!(order = %order.order_number, error = %e, "customer lookup failed");
                return;
            }
        };
        let lines = match orders::lines(self.pool, order.id).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(order = %order.order_number, error = %e, "line lookup failed");
                return;
            }
        };

        let mailer = mailer.clone();
        let order = order.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_order_confirmation(&recipient, &order, &lines)
                .await
            {
                warn!(order = %order.order_number, error = %e, "confirmation email failed");
            }
        });
    }
}

/// Apply the planned action to a locked order. Caller owns the transaction.
async fn apply_locked(
    conn: &mut PgConnection,
    order: &Order,
    external_id: &str,
    status: GatewayStatus,
    raw_payload: &serde_json::Value,
) -> Result<ReconcileAction, ReconcileError> {
    let action = plan(order.payment_status, status);

    match action {
        ReconcileAction::Ignore => {
            info!(
                order = %order.order_number,
                current = %order.payment_status,
                incoming = ?status,
                "notification does not advance payment state; ignoring"
            );
        }
        ReconcileAction::MarkProcessing => {
            orders::set_payment_status(
                conn,
                order.id,
                PaymentStatus::Processing,
                Some(external_id),
                None,
            )
            .await?;
            upsert_payment(conn, order, PaymentStatus::Processing, external_id, raw_payload, None)
                .await?;
        }
        ReconcileAction::ConfirmSale => {
            let to = OrderStatus::Confirmed;
            if !order.status.can_transition_to(to) {
                return Err(ReconcileError::InvalidTransition {
                    from: order.status,
                    to,
                });
            }

            let lines = orders::lines(&mut *conn, order.id).await?;
            for line in &lines {
                inventory::apply(
                    &mut *conn,
                    line.product_id,
                    None,
                    LedgerOp::ConfirmSale(line.quantity),
                    MovementKind::Out,
                    &format!("sale confirmed for order {}", order.order_number),
                )
                .await?;
            }

            orders::transition(&mut *conn, order.id, order.status, to).await?;
            let now = chrono::Utc::now();
            orders::set_payment_status(
                conn,
                order.id,
                PaymentStatus::Approved,
                Some(external_id),
                Some(now),
            )
            .await?;
            upsert_payment(
                conn,
                order,
                PaymentStatus::Approved,
                external_id,
                raw_payload,
                Some(now),
            )
            .await?;
        }
        ReconcileAction::CancelAndRelease => {
            let to = OrderStatus::Cancelled;
            if !order.status.can_transition_to(to) {
                return Err(ReconcileError::InvalidTransition {
                    from: order.status,
                    to,
                });
            }

            let lines = orders::lines(&mut *conn, order.id).await?;
            for line in &lines {
                inventory::apply(
                    &mut *conn,
                    line.product_id,
                    None,
                    LedgerOp::Release(line.quantity),
                    MovementKind::Adjust,
                    &format!("reservation released for cancelled order {}", order.order_number),
                )
                .await?;
            }

            orders::transition(&mut *conn, order.id, order.status, to).await?;
            orders::set_payment_status(
                conn,
                order.id,
                PaymentStatus::Rejected,
                Some(external_id),
                None,
            )
            .await?;
            upsert_payment(conn, order, PaymentStatus::Rejected, external_id, raw_payload, None)
                .await?;
        }
        ReconcileAction::RefundAndRestock => {
            let to = OrderStatus::Returned;
            if !order.status.can_transition_to(to) {
                return Err(ReconcileError::InvalidTransition {
                    from: order.status,
                    to,
                });
            }

            let lines = orders::lines(&mut *conn, order.id).await?;
            for line in &lines {
                inventory::apply(
                    &mut *conn,
                    line.product_id,
                    None,
                    LedgerOp::Add(line.quantity),
                    MovementKind::Return,
                    &format!("refund restock for order {}", order.order_number),
                )
                .await?;
            }

            orders::transition(&mut *conn, order.id, order.status, to).await?;
            orders::set_payment_status(
                conn,
                order.id,
                PaymentStatus::Refunded,
                Some(external_id),
                None,
            )
            .await?;
            upsert_payment(conn, order, PaymentStatus::Refunded, external_id, raw_payload, None)
                .await?;
        }
    }

    Ok(action)
}

async fn upsert_payment(
    conn: &mut PgConnection,
    order: &Order,
    status: PaymentStatus,
    external_id: &str,
    raw_payload: &serde_json::Value,
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<(), RepositoryError> {
    orders::upsert_payment(
        conn,
        &PaymentUpsert {
            order_id: order.id,
            amount: order.total,
            method: order.payment_method,
            status,
            external_payment_id: Some(external_id.to_string()),
            gateway_reference: None,
            card_brand: None,
            card_last4: None,
            raw_payload: Some(raw_payload.clone()),
            paid_at,
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_fresh_order() {
        let current = PaymentStatus::Pending;
        assert_eq!(
            plan(current, GatewayStatus::Approved),
            ReconcileAction::ConfirmSale
        );
        assert_eq!(
            plan(current, GatewayStatus::Pending),
            ReconcileAction::MarkProcessing
        );
        assert_eq!(
            plan(current, GatewayStatus::InProcess),
            ReconcileAction::MarkProcessing
        );
        assert_eq!(
            plan(current, GatewayStatus::Rejected),
            ReconcileAction::CancelAndRelease
        );
        assert_eq!(
            plan(current, GatewayStatus::Cancelled),
            ReconcileAction::CancelAndRelease
        );
    }

    #[test]
    fn test_plan_replayed_approval_is_ignored() {
        // The double-confirmation guard: an approved payment stays approved.
        assert_eq!(
            plan(PaymentStatus::Approved, GatewayStatus::Approved),
            ReconcileAction::Ignore
        );
    }

    #[test]
    fn test_plan_backward_notifications_are_ignored() {
        // A late `pending` after settlement must not regress the payment.
        assert_eq!(
            plan(PaymentStatus::Approved, GatewayStatus::Pending),
            ReconcileAction::Ignore
        );
        assert_eq!(
            plan(PaymentStatus::Approved, GatewayStatus::InProcess),
            ReconcileAction::Ignore
        );
        assert_eq!(
            plan(PaymentStatus::Rejected, GatewayStatus::Pending),
            ReconcileAction::Ignore
        );
        assert_eq!(
            plan(PaymentStatus::Approved, GatewayStatus::Rejected),
            ReconcileAction::Ignore
        );
        assert_eq!(
            plan(PaymentStatus::Rejected, GatewayStatus::Approved),
            ReconcileAction::Ignore
        );
    }

    #[test]
    fn test_plan_refund_only_after_approval() {
        assert_eq!(
            plan(PaymentStatus::Approved, GatewayStatus::Refunded),
            ReconcileAction::RefundAndRestock
        );
        assert_eq!(
            plan(PaymentStatus::Pending, GatewayStatus::Refunded),
            ReconcileAction::Ignore
        );
        assert_eq!(
            plan(PaymentStatus::Rejected, GatewayStatus::Refunded),
            ReconcileAction::Ignore
        );
        assert_eq!(
            plan(PaymentStatus::Refunded, GatewayStatus::Refunded),
            ReconcileAction::Ignore
        );
    }

    #[test]
    fn test_plan_processing_still_settles() {
        assert_eq!(
            plan(PaymentStatus::Processing, GatewayStatus::Approved),
            ReconcileAction::ConfirmSale
        );
        assert_eq!(
            plan(PaymentStatus::Processing, GatewayStatus::Rejected),
            ReconcileAction::CancelAndRelease
        );
        assert_eq!(
            plan(PaymentStatus::Processing, GatewayStatus::Pending),
            ReconcileAction::Ignore
        );
    }
}
