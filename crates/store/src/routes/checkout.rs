//! Checkout endpoint.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tangelo_core::{Email, PaymentMethod};

use crate::db::customers;
use crate::error::AppError;
use crate::models::OrderOutcome;
use crate::services::checkout::{CheckoutLine, CheckoutRequest, CheckoutService};
use crate::state::AppState;

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct CheckoutPayload {
    /// The buyer's identity; resolved (and lazily created) to a customer.
    pub email: Email,
    pub payment_method: PaymentMethod,
    /// Required for the card method.
    #[serde(default)]
    pub card_token: Option<String>,
    pub lines: Vec<CheckoutLine>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/checkout", post(checkout))
}

/// `POST /checkout`
async fn checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutPayload>,
) -> Result<Json<OrderOutcome>, AppError> {
    if payload.lines.is_empty() {
        return Err(AppError::BadRequest(
            "order must contain at least one line".to_string(),
        ));
    }

    let customer = customers::get_or_create(state.pool(), &payload.email).await?;

    let outcome = CheckoutService::new(&state)
        .checkout(
            &customer,
            CheckoutRequest {
                lines: payload.lines,
                payment_method: payload.payment_method,
                card_token: payload.card_token,
            },
        )
        .await?;

    Ok(Json(outcome))
}
