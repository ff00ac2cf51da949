//! Payment strategy dispatch.
//!
//! One entry point ([`PaymentDispatcher::process`]) selects between the
//! synchronous flows (card charge, bank transfer, cash on delivery), whose
//! outcome is known before the call returns, and the asynchronous redirect
//! flow, whose outcome arrives later through the webhook reconciler. Both
//! gateway adapters normalize their responses into the same
//! [`PaymentOutcome`] contract.

pub mod card;
pub mod redirect;

use rust_decimal::Decimal;
use serde::Serialize;
use tangelo_core::{Money, PaymentMethod, PaymentStatus};
use thiserror::Error;

pub use card::CardGateway;
pub use redirect::RedirectGateway;

use crate::config::StoreConfig;
use crate::models::Order;

/// Errors from a payment attempt.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway gave a definitive no. Not retryable with the same input.
    #[error("payment declined: {0}")]
    Declined(String),

    /// The gateway was unreachable or answered outside its contract.
    /// Transient; the caller may re-initiate checkout.
    #[error("payment gateway error: {0}")]
    Gateway(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        Self::Gateway(e.to_string())
    }
}

/// Status vocabulary of the asynchronous gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Approved,
    Pending,
    InProcess,
    Rejected,
    Cancelled,
    Refunded,
}

/// A status string the gateway contract does not define.
#[derive(Debug, Clone, Error)]
#[error("unrecognized gateway status: {0}")]
pub struct UnrecognizedStatus(pub String);

impl std::str::FromStr for GatewayStatus {
    type Err = UnrecognizedStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "pending" => Ok(Self::Pending),
            "in_process" => Ok(Self::InProcess),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            _ => Err(UnrecognizedStatus(s.to_string())),
        }
    }
}

impl GatewayStatus {
    /// The payment state a notification with this status drives towards.
    #[must_use]
    pub const fn target_payment_status(self) -> PaymentStatus {
        match self {
            Self::Approved => PaymentStatus::Approved,
            Self::Pending | Self::InProcess => PaymentStatus::Processing,
            Self::Rejected | Self::Cancelled => PaymentStatus::Rejected,
            Self::Refunded => PaymentStatus::Refunded,
        }
    }
}

/// Normalized result of a payment attempt.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    /// Whether the payment is settled in our favor.
    pub approved: bool,
    /// Whether the buyer must be sent to the gateway to finish paying.
    pub requires_redirect: bool,
    pub redirect_url: Option<String>,
    /// Gateway-side reference for this payment.
    pub external_id: Option<String>,
    pub status: PaymentStatus,
    /// Display snapshots for card payments.
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    /// The gateway response, verbatim.
    pub raw_payload: serde_json::Value,
}

/// One sellable item as presented to the hosted checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// What the dispatcher needs to know about the payment being attempted.
#[derive(Debug)]
pub struct PaymentIntent<'a> {
    /// Human-readable charge description (order number).
    pub description: String,
    pub amount: Money,
    /// Card token, required for the card method.
    pub card_token: Option<&'a str>,
    /// The already-persisted order; required for the redirect method, which
    /// must embed the order id in the gateway's return URL and metadata.
    pub order: Option<&'a Order>,
    /// Line snapshots for the hosted checkout page.
    pub items: Vec<PreferenceItem>,
}

/// Selects and drives a payment flow.
#[derive(Clone)]
pub struct PaymentDispatcher {
    card: CardGateway,
    redirect: RedirectGateway,
}

impl PaymentDispatcher {
    /// Build both gateway adapters from configuration.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` if an HTTP client fails to build.
    pub fn new(config: &StoreConfig) -> Result<Self, PaymentError> {
        Ok(Self {
            card: CardGateway::new(&config.card_gateway)?,
            redirect: RedirectGateway::new(&config.checkout_gateway, &config.base_url)?,
        })
    }

    /// Attempt a payment with the selected method.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Declined` for a definitive rejection and
    /// `PaymentError::Gateway` for transport or contract failures. Nothing
    /// is persisted here; callers decide what survives a failure.
    pub async fn process(
        &self,
        intent: PaymentIntent<'_>,
        method: PaymentMethod,
    ) -> Result<PaymentOutcome, PaymentError> {
        match method {
            PaymentMethod::Card => {
                let token = intent
                    .card_token
                    .ok_or_else(|| PaymentError::Declined("card token required".to_string()))?;
                self.card
                    .charge(token, intent.amount, &intent.description)
                    .await
            }
            PaymentMethod::Transfer => Ok(local_approval("TRF", "transfer")),
            PaymentMethod::CashOnDelivery => Ok(local_approval("COD", "cash_on_delivery")),
            PaymentMethod::Gateway => {
                let order = intent.order.ok_or_else(|| {
                    PaymentError::Gateway("redirect flow requires a persisted order".to_string())
                })?;
                self.redirect.create_preference(order, &intent.items).await
            }
        }
    }

    /// Query the asynchronous gateway for a payment's current status.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` on transport failure or an undefined
    /// status string.
    pub async fn query_status(
        &self,
        external_id: &str,
    ) -> Result<(GatewayStatus, serde_json::Value), PaymentError> {
        self.redirect.query_status(external_id).await
    }
}

/// Settled-on-the-spot outcome for methods with no gateway round-trip.
fn local_approval(prefix: &str, method: &str) -> PaymentOutcome {
    let reference = format!("{prefix}-{}", uuid::Uuid::new_v4().simple());
    PaymentOutcome {
        approved: true,
        requires_redirect: false,
        redirect_url: None,
        external_id: Some(reference),
        status: PaymentStatus::Approved,
        card_brand: None,
        card_last4: None,
        raw_payload: serde_json::json!({ "method": method }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_status_parsing() {
        assert_eq!("approved".parse::<GatewayStatus>().unwrap(), GatewayStatus::Approved);
        assert_eq!("pending".parse::<GatewayStatus>().unwrap(), GatewayStatus::Pending);
        assert_eq!(
            "in_process".parse::<GatewayStatus>().unwrap(),
            GatewayStatus::InProcess
        );
        assert_eq!("rejected".parse::<GatewayStatus>().unwrap(), GatewayStatus::Rejected);
        assert_eq!(
            "cancelled".parse::<GatewayStatus>().unwrap(),
            GatewayStatus::Cancelled
        );
        assert_eq!("refunded".parse::<GatewayStatus>().unwrap(), GatewayStatus::Refunded);

        let err = "chargeback".parse::<GatewayStatus>().unwrap_err();
        assert_eq!(err.0, "chargeback");
    }

    #[test]
    fn test_target_payment_status_mapping() {
        assert_eq!(
            GatewayStatus::Approved.target_payment_status(),
            PaymentStatus::Approved
        );
        assert_eq!(
            GatewayStatus::Pending.target_payment_status(),
            PaymentStatus::Processing
        );
        assert_eq!(
            GatewayStatus::InProcess.target_payment_status(),
            PaymentStatus::Processing
        );
        assert_eq!(
            GatewayStatus::Rejected.target_payment_status(),
            PaymentStatus::Rejected
        );
        assert_eq!(
            GatewayStatus::Cancelled.target_payment_status(),
            PaymentStatus::Rejected
        );
        assert_eq!(
            GatewayStatus::Refunded.target_payment_status(),
            PaymentStatus::Refunded
        );
    }

    #[test]
    fn test_local_approval_shape() {
        let outcome = local_approval("TRF", "transfer");
        assert!(outcome.approved);
        assert!(!outcome.requires_redirect);
        assert_eq!(outcome.status, PaymentStatus::Approved);
        assert!(outcome.external_id.unwrap().starts_with("TRF-"));
    }
}
