//! Inventory record and movement audit trail.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tangelo_core::{CustomerId, MovementId, MovementKind, ProductId, StockLevels};

/// Per-product stock record.
///
/// The two counters are only ever written by the ledger operations in
/// [`crate::db::inventory`]; everything else reads.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    /// The stored counters.
    #[serde(flatten)]
    pub levels: StockLevels,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Units sellable right now (`on_hand - reserved`).
    #[must_use]
    pub const fn available(&self) -> i32 {
        self.levels.available()
    }
}

/// One entry in the append-only inventory audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    /// Acting customer, when the change was user-initiated.
    pub customer_id: Option<CustomerId>,
    pub kind: MovementKind,
    pub quantity: i32,
    /// On-hand count before the change.
    pub stock_before: i32,
    /// On-hand count after the change.
    pub stock_after: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
