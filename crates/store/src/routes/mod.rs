//! HTTP surface of the store.
//!
//! The routes are a thin mapping layer: parse, resolve the customer, call a
//! service, serialize. All invariants live below.

pub mod checkout;
pub mod inventory;
pub mod orders;
pub mod webhook;

use axum::Router;

use crate::state::AppState;

/// All store routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(checkout::routes())
        .merge(orders::routes())
        .merge(webhook::routes())
        .merge(inventory::routes())
}
