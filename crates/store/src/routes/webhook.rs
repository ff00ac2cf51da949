//! Payment gateway webhook endpoint.
//!
//! The gateway must always receive an acknowledgement: malformed payloads,
//! unknown payments, and internal failures are logged and answered 200 all
//! the same, otherwise the gateway retries into a storm.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tracing::warn;

use crate::services::webhook::WebhookReconciler;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/payments", post(payment_webhook))
}

/// `POST /webhooks/payments`
async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let external_id = payload
        .get("external_id")
        .or_else(|| payload.get("id"))
        .and_then(serde_json::Value::as_str);
    let status = payload.get("status").and_then(serde_json::Value::as_str);

    match (external_id, status) {
        (Some(external_id), Some(status)) => {
            WebhookReconciler::new(state.pool(), state.mailer())
                .process_notification(external_id, status, payload.clone())
                .await;
        }
        _ => warn!("discarding malformed gateway notification"),
    }

    StatusCode::OK
}
