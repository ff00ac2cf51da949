//! Order lookup and buyer-return endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tangelo_core::{Email, OrderId};

use crate::db::{customers, orders};
use crate::error::AppError;
use crate::models::{Order, OrderLine, OrderOutcome, PaymentRecord, StateTransition};
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

/// Buyer-return query parameters, filled in by the gateway's back URL.
#[derive(Debug, Deserialize)]
pub struct ReturnParams {
    pub payment_id: String,
    pub email: Email,
}

/// Identity parameter for order lookups.
#[derive(Debug, Deserialize)]
pub struct OwnerParams {
    pub email: Email,
}

/// An order with everything it owns.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub history: Vec<StateTransition>,
    pub payment: Option<PaymentRecord>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{order_id}", get(order_detail))
        .route("/orders/{order_id}/return", get(confirm_return))
}

/// `GET /orders/{order_id}?email=...`
async fn order_detail(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Query(params): Query<OwnerParams>,
) -> Result<Json<OrderDetail>, AppError> {
    let not_found = || AppError::NotFound("order".to_string());
    let order_id = OrderId::new(order_id);

    let customer = customers::find_by_email(state.pool(), &params.email)
        .await?
        .ok_or_else(not_found)?;
    let order = orders::get(state.pool(), order_id)
        .await?
        .ok_or_else(not_found)?;
    if order.customer_id != customer.id {
        // Do not leak existence of other customers' orders.
        return Err(not_found());
    }

    let lines = orders::lines(state.pool(), order_id).await?;
    let history = orders::history(state.pool(), order_id).await?;
    let payment = orders::payment(state.pool(), order_id).await?;

    Ok(Json(OrderDetail {
        order,
        lines,
        history,
        payment,
    }))
}

/// `GET /orders/{order_id}/return?payment_id=...&email=...`
///
/// Where the gateway sends the buyer afterwards; reconciles the order
/// against the gateway's status-query endpoint.
async fn confirm_return(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Query(params): Query<ReturnParams>,
) -> Result<Json<OrderOutcome>, AppError> {
    let customer = customers::find_by_email(state.pool(), &params.email)
        .await?
        .ok_or_else(|| AppError::NotFound("order".to_string()))?;

    let outcome = CheckoutService::new(&state)
        .confirm_return(&customer, OrderId::new(order_id), &params.payment_id)
        .await?;

    Ok(Json(outcome))
}
