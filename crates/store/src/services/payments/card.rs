//! Synchronous charge gateway adapter.
//!
//! Speaks to a card-present charge API: one POST, definitive answer. A
//! declined charge is a terminal outcome for the attempt; anything else
//! (transport failure, 5xx, malformed body) is a transient gateway error
//! and nothing may be persisted by the caller.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use tangelo_core::{Money, PaymentStatus};

use super::{PaymentError, PaymentOutcome};
use crate::config::CardGatewayConfig;

/// Charge request body.
#[derive(Debug, Serialize)]
struct ChargeRequest<'a> {
    token: &'a str,
    amount: rust_decimal::Decimal,
    currency: &'static str,
    description: &'a str,
}

/// Client for the synchronous charge API.
#[derive(Clone)]
pub struct CardGateway {
    client: reqwest::Client,
    base_url: String,
}

impl CardGateway {
    /// Create a new charge gateway client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` if the HTTP client fails to build.
    pub fn new(config: &CardGatewayConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PaymentError::Gateway(format!("invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Charge a tokenized card.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Declined` when the gateway definitively
    /// rejects the charge, `PaymentError::Gateway` otherwise.
    pub async fn charge(
        &self,
        token: &str,
        amount: Money,
        description: &str,
    ) -> Result<PaymentOutcome, PaymentError> {
        let url = format!("{}/charges", self.base_url);
        let body = ChargeRequest {
            token,
            amount: amount.amount,
            currency: amount.currency.code(),
            description,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(format!("unparseable charge response: {e}")))?;

        if status.is_client_error() {
            // A definitive no from the gateway (bad token, insufficient funds).
            let reason = payload
                .get("reason")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("charge rejected")
                .to_string();
            return Err(PaymentError::Declined(reason));
        }
        if !status.is_success() {
            return Err(PaymentError::Gateway(format!(
                "charge endpoint returned {status}"
            )));
        }

        let approved = payload
            .get("approved")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| {
                PaymentError::Gateway("charge response missing 'approved'".to_string())
            })?;

        if !approved {
            let reason = payload
                .get("reason")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("charge declined")
                .to_string();
            return Err(PaymentError::Declined(reason));
        }

        let external_id = payload
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);
        let card_brand = payload
            .get("card_brand")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);
        let card_last4 = payload
            .get("card_last4")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);

        Ok(PaymentOutcome {
            approved: true,
            requires_redirect: false,
            redirect_url: None,
            external_id,
            status: PaymentStatus::Approved,
            card_brand,
            card_last4,
            raw_payload: payload,
        })
    }
}
