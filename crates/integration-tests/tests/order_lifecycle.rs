//! Order and payment lifecycle walks, and how the reconciliation planner
//! treats the messy delivery patterns real gateways produce.

use tangelo_core::{OrderStatus, PaymentStatus};
use tangelo_store::services::payments::GatewayStatus;
use tangelo_store::services::webhook::{ReconcileAction, plan};

/// The happy fulfillment path is walkable end to end.
#[test]
fn test_full_fulfillment_walk() {
    let walk = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::InTransit,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Returned,
    ];

    for pair in walk.windows(2) {
        assert!(
            pair[0].can_transition_to(pair[1]),
            "{:?} -> {:?} must be allowed",
            pair[0],
            pair[1]
        );
    }
}

/// Terminal states really are terminal.
#[test]
fn test_terminal_states_accept_nothing() {
    let all = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::InTransit,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    for target in all {
        assert!(!OrderStatus::Cancelled.can_transition_to(target));
        assert!(!OrderStatus::Returned.can_transition_to(target));
    }
    // Delivered is terminal for fulfillment but still refundable.
    for target in all {
        let allowed = OrderStatus::Delivered.can_transition_to(target);
        assert_eq!(allowed, target == OrderStatus::Returned);
    }
}

/// Payment state never regresses, whatever order notifications arrive in.
#[test]
fn test_payment_never_regresses() {
    let all = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Approved,
        PaymentStatus::Rejected,
        PaymentStatus::Refunded,
    ];
    let rank = |s: PaymentStatus| match s {
        PaymentStatus::Pending => 0,
        PaymentStatus::Processing => 1,
        PaymentStatus::Approved | PaymentStatus::Rejected => 2,
        PaymentStatus::Refunded => 3,
    };

    for from in all {
        for to in all {
            if from.can_advance_to(to) {
                assert!(
                    rank(to) > rank(from),
                    "{from:?} -> {to:?} would move payment state backward"
                );
            }
        }
    }
}

/// A full out-of-order delivery sequence settles the order exactly once
/// with the terminal outcome, regardless of the stragglers.
#[test]
fn test_out_of_order_delivery_settles_once() {
    // Gateway sends: approved first, then stale progress updates, then a
    // duplicate approval.
    let deliveries = [
        GatewayStatus::Approved,
        GatewayStatus::Pending,
        GatewayStatus::InProcess,
        GatewayStatus::Approved,
    ];

    let mut payment = PaymentStatus::Pending;
    let mut confirmations = 0;

    for status in deliveries {
        match plan(payment, status) {
            ReconcileAction::ConfirmSale => {
                confirmations += 1;
                payment = PaymentStatus::Approved;
            }
            ReconcileAction::MarkProcessing => payment = PaymentStatus::Processing,
            ReconcileAction::Ignore => {}
            other => panic!("unexpected action {other:?}"),
        }
    }

    assert_eq!(confirmations, 1);
    assert_eq!(payment, PaymentStatus::Approved);
}

/// The refund path only opens after settlement in our favor.
#[test]
fn test_refund_requires_prior_approval() {
    assert_eq!(
        plan(PaymentStatus::Pending, GatewayStatus::Refunded),
        ReconcileAction::Ignore
    );
    assert_eq!(
        plan(PaymentStatus::Processing, GatewayStatus::Refunded),
        ReconcileAction::Ignore
    );
    assert_eq!(
        plan(PaymentStatus::Approved, GatewayStatus::Refunded),
        ReconcileAction::RefundAndRestock
    );
}

/// A notification payload as the gateway actually sends it parses into a
/// plannable status.
#[test]
fn test_notification_payload_drives_planner() {
    let payload: serde_json::Value = serde_json::from_str(
        r#"{
            "id": "pref-8842",
            "external_id": "pref-8842",
            "status": "approved",
            "amount": "42.00"
        }"#,
    )
    .expect("well-formed payload");

    let status = payload
        .get("status")
        .and_then(serde_json::Value::as_str)
        .expect("status present")
        .parse::<GatewayStatus>()
        .expect("known status");

    assert_eq!(
        plan(PaymentStatus::Pending, status),
        ReconcileAction::ConfirmSale
    );

    // A status outside the gateway vocabulary is discarded, never applied.
    assert!("charged_back".parse::<GatewayStatus>().is_err());
}

/// A rejected payment cannot be resurrected by a late approval.
#[test]
fn test_rejection_is_final() {
    assert_eq!(
        plan(PaymentStatus::Rejected, GatewayStatus::Approved),
        ReconcileAction::Ignore
    );
    assert_eq!(
        plan(PaymentStatus::Rejected, GatewayStatus::Refunded),
        ReconcileAction::Ignore
    );
}
