//! Redirect (hosted checkout) gateway adapter.
//!
//! The asynchronous flow: create a payment preference carrying the order id
//! as external reference, send the buyer to the returned URL, and learn the
//! outcome later from webhooks (or the status-query endpoint when the buyer
//! comes back).

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use tangelo_core::PaymentStatus;

use super::{GatewayStatus, PaymentError, PaymentOutcome, PreferenceItem};
use crate::config::CheckoutGatewayConfig;
use crate::models::Order;

/// Preference creation request body.
#[derive(Debug, Serialize)]
struct PreferenceRequest<'a> {
    items: &'a [PreferenceItem],
    external_reference: String,
    back_urls: BackUrls,
}

/// Where the gateway sends the buyer afterwards.
#[derive(Debug, Serialize)]
struct BackUrls {
    success: String,
    failure: String,
    pending: String,
}

/// Client for the redirect gateway's preference and status APIs.
#[derive(Clone)]
pub struct RedirectGateway {
    client: reqwest::Client,
    base_url: String,
    /// Public base URL of the store, for return URLs.
    return_base: String,
}

impl RedirectGateway {
    /// Create a new redirect gateway client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` if the HTTP client fails to build.
    pub fn new(config: &CheckoutGatewayConfig, return_base: &str) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.access_token.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PaymentError::Gateway(format!("invalid access token format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            return_base: return_base.trim_end_matches('/').to_string(),
        })
    }

    /// Create a checkout preference for an already-persisted order.
    ///
    /// The order id rides along as the gateway's external reference and in
    /// the return URLs, so webhooks and the buyer-return path can find the
    /// order again.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` on transport failure or a response
    /// outside the contract. The caller's order and reservation survive; the
    /// reaper collects them if the buyer never completes.
    pub async fn create_preference(
        &self,
        order: &Order,
        items: &[PreferenceItem],
    ) -> Result<PaymentOutcome, PaymentError> {
        let url = format!("{}/preferences", self.base_url);
        let return_url = |leg: &str| {
            format!(
                "{}/orders/{}/return?result={leg}",
                self.return_base, order.id
            )
        };
        let body = PreferenceRequest {
            items,
            external_reference: order.id.to_string(),
            back_urls: BackUrls {
                success: return_url("success"),
                failure: return_url("failure"),
                pending: return_url("pending"),
            },
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::Gateway(format!(
                "preference endpoint returned {status}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(format!("unparseable preference response: {e}")))?;

        let external_id = payload
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                PaymentError::Gateway("preference response missing 'id'".to_string())
            })?
            .to_string();
        let redirect_url = payload
            .get("init_point")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                PaymentError::Gateway("preference response missing 'init_point'".to_string())
            })?
            .to_string();

        Ok(PaymentOutcome {
            approved: false,
            requires_redirect: true,
            redirect_url: Some(redirect_url),
            external_id: Some(external_id),
            status: PaymentStatus::Pending,
            card_brand: None,
            card_last4: None,
            raw_payload: payload,
        })
    }

    /// Ask the gateway for a payment's current status.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` on transport failure or a status
    /// string outside the contract.
    pub async fn query_status(
        &self,
        external_id: &str,
    ) -> Result<(GatewayStatus, serde_json::Value), PaymentError> {
        let url = format!("{}/payments/{external_id}", self.base_url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::Gateway(format!(
                "status endpoint returned {status}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(format!("unparseable status response: {e}")))?;

        let gateway_status = payload
            .get("status")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| PaymentError::Gateway("status response missing 'status'".to_string()))?
            .parse::<GatewayStatus>()
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        Ok((gateway_status, payload))
    }
}
