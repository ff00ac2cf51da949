//! Status enums and their transition rules.
//!
//! The order lifecycle and the payment lifecycle are parallel state
//! machines. Order states move through fulfillment; payment states only ever
//! advance forward, which is what makes webhook reconciliation idempotent
//! under duplicated or out-of-order gateway notifications.

use serde::{Deserialize, Serialize};

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Whether the order can move to `next`.
    ///
    /// Forward progress is linear (`Pending` through `Delivered`); any
    /// non-terminal state may be cancelled; `Returned` is reachable from any
    /// paid state on the refund path.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Confirmed)
            | (Self::Confirmed, Self::Processing)
            | (Self::Processing, Self::Shipped)
            | (Self::Shipped, Self::InTransit)
            | (Self::InTransit, Self::OutForDelivery)
            | (Self::OutForDelivery, Self::Delivered)
            | (Self::Delivered, Self::Returned) => true,
            (from, Self::Cancelled) => !from.is_terminal(),
            (from, Self::Returned) => from.is_paid(),
            _ => false,
        }
    }

    /// Terminal states accept no further transitions except
    /// `Delivered -> Returned`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Returned)
    }

    /// States in which stock for the order has been confirmed (sold).
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(
            self,
            Self::Confirmed
                | Self::Processing
                | Self::Shipped
                | Self::InTransit
                | Self::OutForDelivery
                | Self::Delivered
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::InTransit => "in_transit",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "in_transit" => Ok(Self::InTransit),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "returned" => Ok(Self::Returned),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Payment lifecycle state, parallel to the order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Approved,
    Rejected,
    Refunded,
}

impl PaymentStatus {
    /// Whether the payment may advance to `next`.
    ///
    /// Payment state never moves backward: once a terminal outcome is
    /// recorded, only `Approved -> Refunded` remains. A notification that
    /// does not advance the state is treated by callers as a no-op.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Processing | Self::Approved | Self::Rejected
            ) | (Self::Processing, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Refunded)
        )
    }

    /// `Rejected` and `Refunded` accept nothing further; `Approved` only a
    /// refund.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Refunded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "refunded" => Ok(Self::Refunded),
            _ => Err(format!("invalid payment status: {s}")),
        }
    }
}

/// How the buyer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card charge through the synchronous gateway.
    Card,
    /// Bank transfer, settled on receipt.
    Transfer,
    /// Paid to the courier on delivery.
    CashOnDelivery,
    /// Redirect-based hosted checkout; outcome arrives via webhook.
    Gateway,
}

impl PaymentMethod {
    /// Whether the payment outcome arrives later via webhook.
    #[must_use]
    pub const fn is_asynchronous(self) -> bool {
        matches!(self, Self::Gateway)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Card => "card",
            Self::Transfer => "transfer",
            Self::CashOnDelivery => "cash_on_delivery",
            Self::Gateway => "gateway",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "transfer" => Ok(Self::Transfer),
            "cash_on_delivery" => Ok(Self::CashOnDelivery),
            "gateway" => Ok(Self::Gateway),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Movement kinds recorded in the inventory audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Stock received into the warehouse.
    In,
    /// Stock removed (sale, damage, shrinkage).
    Out,
    /// Manual correction or reservation bookkeeping.
    Adjust,
    /// Stock re-added after a refund.
    Return,
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Adjust => "adjust",
            Self::Return => "return",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "adjust" => Ok(Self::Adjust),
            "return" => Ok(Self::Return),
            _ => Err(format!("invalid movement kind: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_forward_path() {
        let path = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::InTransit,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Returned));
    }

    #[test]
    fn test_any_non_terminal_order_can_cancel() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::InTransit,
            OrderStatus::OutForDelivery,
        ] {
            assert!(status.can_transition_to(OrderStatus::Cancelled));
        }
        for status in [
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Returned,
        ] {
            assert!(!status.can_transition_to(OrderStatus::Cancelled));
        }
    }

    #[test]
    fn test_refund_reachable_from_paid_states() {
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Returned));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Returned));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Returned));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Returned));
    }

    #[test]
    fn test_order_no_backward_transitions() {
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn test_payment_forward_only() {
        use PaymentStatus::{Approved, Pending, Processing, Refunded, Rejected};

        assert!(Pending.can_advance_to(Processing));
        assert!(Pending.can_advance_to(Approved));
        assert!(Pending.can_advance_to(Rejected));
        assert!(Processing.can_advance_to(Approved));
        assert!(Approved.can_advance_to(Refunded));

        // Backward and cross-terminal moves are all rejected.
        assert!(!Approved.can_advance_to(Pending));
        assert!(!Approved.can_advance_to(Processing));
        assert!(!Approved.can_advance_to(Rejected));
        assert!(!Rejected.can_advance_to(Approved));
        assert!(!Refunded.can_advance_to(Approved));
        assert!(!Processing.can_advance_to(Pending));
    }

    #[test]
    fn test_payment_duplicate_is_not_an_advance() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            PaymentStatus::Approved,
            PaymentStatus::Rejected,
            PaymentStatus::Refunded,
        ] {
            assert!(!status.can_advance_to(status));
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::OutForDelivery,
            OrderStatus::Returned,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>(), Ok(status));
        }
        for method in [
            PaymentMethod::Card,
            PaymentMethod::CashOnDelivery,
            PaymentMethod::Gateway,
        ] {
            assert_eq!(method.to_string().parse::<PaymentMethod>(), Ok(method));
        }
        for kind in [MovementKind::In, MovementKind::Return] {
            assert_eq!(kind.to_string().parse::<MovementKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_async_method_flag() {
        assert!(PaymentMethod::Gateway.is_asynchronous());
        assert!(!PaymentMethod::Card.is_asynchronous());
        assert!(!PaymentMethod::Transfer.is_asynchronous());
        assert!(!PaymentMethod::CashOnDelivery.is_asynchronous());
    }
}
