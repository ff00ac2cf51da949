//! Manual stock adjustment and inventory views.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tangelo_core::{Email, LedgerError, MovementKind, ProductId, StockLevels};

use crate::db::inventory::{self, LedgerOp};
use crate::db::{RepositoryError, customers, products};
use crate::error::AppError;
use crate::models::Movement;
use crate::state::AppState;

/// Manual adjustment request body.
#[derive(Debug, Deserialize)]
pub struct AdjustPayload {
    pub kind: MovementKind,
    /// For `adjust`, a negative quantity removes stock.
    pub quantity: i32,
    pub reason: String,
    /// Acting user, recorded in the movement trail.
    #[serde(default)]
    pub actor_email: Option<Email>,
}

/// Inventory record as exposed to callers, with the derived quantity.
#[derive(Debug, Serialize)]
pub struct InventoryView {
    pub product_id: ProductId,
    pub on_hand: i32,
    pub reserved: i32,
    pub available: i32,
}

impl InventoryView {
    fn new(product_id: ProductId, levels: StockLevels) -> Self {
        Self {
            product_id,
            on_hand: levels.on_hand,
            reserved: levels.reserved,
            available: levels.available(),
        }
    }
}

impl From<crate::models::InventoryRecord> for InventoryView {
    fn from(record: crate::models::InventoryRecord) -> Self {
        Self {
            product_id: record.product_id,
            on_hand: record.levels.on_hand,
            reserved: record.levels.reserved,
            available: record.available(),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/inventory/{product_id}", get(get_record))
        .route("/inventory/{product_id}/movements", get(list_movements))
        .route("/inventory/{product_id}/adjust", post(adjust))
}

/// `POST /inventory/{product_id}/adjust`
async fn adjust(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Json(payload): Json<AdjustPayload>,
) -> Result<Json<InventoryView>, AppError> {
    let product_id = ProductId::new(product_id);

    let actor = match &payload.actor_email {
        Some(email) => customers::find_by_email(state.pool(), email)
            .await?
            .map(|c| c.id),
        None => None,
    };

    let op = match (payload.kind, payload.quantity) {
        (MovementKind::In | MovementKind::Return, qty) => LedgerOp::Add(qty),
        (MovementKind::Out, qty) => LedgerOp::Reduce(qty),
        // Signed adjustment: positive receives, negative removes.
        (MovementKind::Adjust, qty) if qty > 0 => LedgerOp::Add(qty),
        (MovementKind::Adjust, qty) if qty < 0 => LedgerOp::Reduce(-qty),
        (MovementKind::Adjust, qty) => {
            return Err(AppError::Inventory(LedgerError::InvalidQuantity(qty).into()));
        }
    };

    let mut tx = state.pool().begin().await.map_err(RepositoryError::from)?;
    let record =
        inventory::apply(&mut tx, product_id, actor, op, payload.kind, &payload.reason).await?;
    tx.commit().await.map_err(RepositoryError::from)?;

    Ok(Json(record.into()))
}

/// `GET /inventory/{product_id}`
///
/// A product whose record has not materialized yet reports its legacy stock
/// seed with nothing reserved.
async fn get_record(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<InventoryView>, AppError> {
    let product_id = ProductId::new(product_id);

    if let Some(record) = inventory::get(state.pool(), product_id).await? {
        return Ok(Json(InventoryView::new(product_id, record.levels)));
    }

    let product = products::get(state.pool(), product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;

    Ok(Json(InventoryView::new(
        product_id,
        StockLevels::new(product.legacy_stock, 0),
    )))
}

/// `GET /inventory/{product_id}/movements`
async fn list_movements(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<Vec<Movement>>, AppError> {
    let movements =
        inventory::recent_movements(state.pool(), ProductId::new(product_id), 100).await?;
    Ok(Json(movements))
}
