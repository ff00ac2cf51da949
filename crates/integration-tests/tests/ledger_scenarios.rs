//! End-to-end stock scenarios: each test replays one full flow through the
//! ledger transitions and the reconciliation planner, asserting the exact
//! counter values the engine must reach.

use tangelo_core::{LedgerError, OrderStatus, PaymentStatus, StockLevels};
use tangelo_store::services::payments::GatewayStatus;
use tangelo_store::services::webhook::{ReconcileAction, plan};

/// Async checkout reserves, webhook approval confirms the sale.
#[test]
fn test_async_checkout_then_approval() {
    let stock = StockLevels::new(10, 0);

    // Checkout reserves 3 units for the pending order.
    let stock = stock.reserve(3).expect("reservation fits");
    assert_eq!(stock, StockLevels::new(10, 3));

    // Webhook reports approved: confirm the sale.
    assert_eq!(
        plan(PaymentStatus::Pending, GatewayStatus::Approved),
        ReconcileAction::ConfirmSale
    );
    let stock = stock.confirm_sale(3).expect("reservation covers the sale");
    assert_eq!(stock, StockLevels::new(7, 0));

    // Order lands Confirmed/Approved.
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
    assert!(PaymentStatus::Pending.can_advance_to(PaymentStatus::Approved));
}

/// Same checkout, but the gateway rejects: the hold is released untouched.
#[test]
fn test_async_checkout_then_rejection() {
    let stock = StockLevels::new(10, 0).reserve(3).expect("reservation fits");
    assert_eq!(stock, StockLevels::new(10, 3));

    assert_eq!(
        plan(PaymentStatus::Pending, GatewayStatus::Rejected),
        ReconcileAction::CancelAndRelease
    );
    let stock = stock.release(3).expect("hold exists");
    assert_eq!(stock, StockLevels::new(10, 0));

    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
    assert!(PaymentStatus::Pending.can_advance_to(PaymentStatus::Rejected));
}

/// Synchronous checkout deducts on-hand directly; a second sale of the same
/// stock fails as insufficient.
#[test]
fn test_sync_checkout_drains_stock() {
    let stock = StockLevels::new(5, 0);

    // First synchronous checkout for the full shelf.
    let stock = stock.reduce(5).expect("stock covers the sale");
    assert_eq!(stock, StockLevels::new(0, 0));

    // Second synchronous checkout for one more unit.
    assert_eq!(
        stock.reduce(1),
        Err(LedgerError::InsufficientStock {
            on_hand: 0,
            requested: 1
        })
    );
}

/// The reaper releases an abandoned order's hold in full.
#[test]
fn test_reaper_releases_abandoned_reservation() {
    let on_hand = 9;
    let stock = StockLevels::new(on_hand, 0).reserve(4).expect("reservation fits");
    assert_eq!(stock.reserved, 4);
    assert_eq!(stock.available(), on_hand - 4);

    let stock = stock.release(4).expect("hold exists");
    assert_eq!(stock, StockLevels::new(on_hand, 0));
}

/// A refund on a confirmed order puts the sold units back on hand.
#[test]
fn test_refund_restocks_sold_units() {
    // Sold out: 2 units went through reserve + confirm earlier.
    let stock = StockLevels::new(2, 0)
        .reserve(2)
        .and_then(|s| s.confirm_sale(2))
        .expect("sale settles");
    assert_eq!(stock, StockLevels::new(0, 0));

    assert_eq!(
        plan(PaymentStatus::Approved, GatewayStatus::Refunded),
        ReconcileAction::RefundAndRestock
    );
    let stock = stock.add(2).expect("restock");
    assert_eq!(stock, StockLevels::new(2, 0));

    assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Returned));
    assert!(PaymentStatus::Approved.can_advance_to(PaymentStatus::Refunded));
}

/// Replaying the approval webhook must not confirm stock twice: after the
/// first application the payment is Approved and the planner ignores the
/// duplicate.
#[test]
fn test_replayed_approval_confirms_exactly_once() {
    let mut stock = StockLevels::new(10, 0).reserve(3).expect("reservation fits");
    let mut payment = PaymentStatus::Pending;

    for _ in 0..2 {
        match plan(payment, GatewayStatus::Approved) {
            ReconcileAction::ConfirmSale => {
                stock = stock.confirm_sale(3).expect("reservation covers the sale");
                payment = PaymentStatus::Approved;
            }
            ReconcileAction::Ignore => {}
            other => panic!("unexpected action {other:?}"),
        }
    }

    assert_eq!(stock, StockLevels::new(7, 0));
    assert_eq!(payment, PaymentStatus::Approved);
}

/// Out-of-order delivery: a stale `pending` after settlement changes nothing.
#[test]
fn test_stale_pending_after_settlement_is_ignored() {
    for settled in [
        PaymentStatus::Approved,
        PaymentStatus::Rejected,
        PaymentStatus::Refunded,
    ] {
        for stale in [GatewayStatus::Pending, GatewayStatus::InProcess] {
            assert_eq!(
                plan(settled, stale),
                ReconcileAction::Ignore,
                "{settled:?} must ignore {stale:?}"
            );
        }
    }
}
