//! The inventory ledger.
//!
//! [`apply`] is the only code path that writes the `on_hand`/`reserved`
//! counters. It runs inside the caller's transaction, takes a row-level lock
//! on the product's inventory record (`SELECT ... FOR UPDATE`), computes the
//! next counters through the pure [`StockLevels`] transitions, and appends
//! exactly one movement row. Two concurrent operations against the same
//! product therefore serialize on the row lock, and `available` can never go
//! negative.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tangelo_core::{CustomerId, LedgerError, MovementId, MovementKind, ProductId, StockLevels};
use thiserror::Error;

use super::RepositoryError;
use crate::models::{InventoryRecord, Movement};

/// A ledger operation to apply to one product's stock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    /// Receive stock (`on_hand += qty`).
    Add(i32),
    /// Remove stock (`on_hand -= qty`); the synchronous sale path.
    Reduce(i32),
    /// Hold stock against a pending order (`reserved += qty`).
    Reserve(i32),
    /// Give a hold back (`reserved -= qty`).
    Release(i32),
    /// Turn a hold into a sale (both counters -= qty).
    ConfirmSale(i32),
}

impl LedgerOp {
    /// The quantity this operation moves.
    #[must_use]
    pub const fn quantity(&self) -> i32 {
        match self {
            Self::Add(q) | Self::Reduce(q) | Self::Reserve(q) | Self::Release(q)
            | Self::ConfirmSale(q) => *q,
        }
    }

    /// Apply this operation to a set of stock levels.
    ///
    /// # Errors
    ///
    /// Propagates the [`LedgerError`] of the underlying transition.
    pub fn apply_to(&self, levels: StockLevels) -> Result<StockLevels, LedgerError> {
        match *self {
            Self::Add(q) => levels.add(q),
            Self::Reduce(q) => levels.reduce(q),
            Self::Reserve(q) => levels.reserve(q),
            Self::Release(q) => levels.release(q),
            Self::ConfirmSale(q) => levels.confirm_sale(q),
        }
    }
}

/// Errors from a ledger application.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// A ledger rule was violated; the enclosing transaction must abort.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The underlying storage failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Internal row type for inventory record queries.
#[derive(Debug, sqlx::FromRow)]
struct InventoryRow {
    product_id: i64,
    on_hand: i32,
    reserved: i32,
    updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryRecord {
    fn from(row: InventoryRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            levels: StockLevels::new(row.on_hand, row.reserved),
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for movement queries.
#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: i64,
    product_id: i64,
    customer_id: Option<i64>,
    kind: String,
    quantity: i32,
    stock_before: i32,
    stock_after: i32,
    reason: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = RepositoryError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind = row.kind.parse::<MovementKind>().map_err(|e| {
            RepositoryError::DataCorruption(format!("movement {}: {e}", row.id))
        })?;

        Ok(Self {
            id: MovementId::new(row.id),
            product_id: ProductId::new(row.product_id),
            customer_id: row.customer_id.map(CustomerId::new),
            kind,
            quantity: row.quantity,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

/// Apply one ledger operation to a product inside the caller's transaction.
///
/// The inventory record is lazily created on first use, seeded from the
/// product's legacy stock counter with nothing reserved. Exactly one
/// movement row is appended per successful application, carrying the
/// before/after on-hand counts and a human-readable reason.
///
/// # Errors
///
/// Returns `InventoryError::Ledger` when the operation violates a stock
/// rule, `RepositoryError::NotFound` (wrapped) when the product does not
/// exist, and `RepositoryError::Database` for storage failures.
pub async fn apply(
    conn: &mut PgConnection,
    product_id: ProductId,
    actor: Option<CustomerId>,
    op: LedgerOp,
    kind: MovementKind,
    reason: &str,
) -> Result<InventoryRecord, InventoryError> {
    // Lazy init: seed from the product's legacy stock field if no record yet.
    sqlx::query(
        r"
        INSERT INTO store.inventory_record (product_id, on_hand, reserved)
        SELECT p.id, p.legacy_stock, 0
        FROM store.product p
        WHERE p.id = $1
        ON CONFLICT (product_id) DO NOTHING
        ",
    )
    .bind(product_id.as_i64())
    .execute(&mut *conn)
    .await?;

    // Row lock: the serialization point for all stock changes to this product.
    let row = sqlx::query_as::<_, InventoryRow>(
        r"
        SELECT product_id, on_hand, reserved, updated_at
        FROM store.inventory_record
        WHERE product_id = $1
        FOR UPDATE
        ",
    )
    .bind(product_id.as_i64())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    let before = StockLevels::new(row.on_hand, row.reserved);
    let after = op.apply_to(before)?;

    let updated = sqlx::query_as::<_, InventoryRow>(
        r"
        UPDATE store.inventory_record
        SET on_hand = $2, reserved = $3, updated_at = now()
        WHERE product_id = $1
        RETURNING product_id, on_hand, reserved, updated_at
        ",
    )
    .bind(product_id.as_i64())
    .bind(after.on_hand)
    .bind(after.reserved)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r"
        INSERT INTO store.inventory_movement
            (product_id, customer_id, kind, quantity, stock_before, stock_after, reason)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ",
    )
    .bind(product_id.as_i64())
    .bind(actor.map(|a| a.as_i64()))
    .bind(kind.to_string())
    .bind(op.quantity())
    .bind(before.on_hand)
    .bind(after.on_hand)
    .bind(reason)
    .execute(&mut *conn)
    .await?;

    Ok(updated.into())
}

/// Read a product's inventory record, if one exists yet.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    executor: impl sqlx::PgExecutor<'_>,
    product_id: ProductId,
) -> Result<Option<InventoryRecord>, RepositoryError> {
    let row = sqlx::query_as::<_, InventoryRow>(
        r"
        SELECT product_id, on_hand, reserved, updated_at
        FROM store.inventory_record
        WHERE product_id = $1
        ",
    )
    .bind(product_id.as_i64())
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Into::into))
}

/// Recent movements for a product, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn recent_movements(
    executor: impl sqlx::PgExecutor<'_>,
    product_id: ProductId,
    limit: i64,
) -> Result<Vec<Movement>, RepositoryError> {
    let rows = sqlx::query_as::<_, MovementRow>(
        r"
        SELECT id, product_id, customer_id, kind, quantity,
               stock_before, stock_after, reason, created_at
        FROM store.inventory_movement
        WHERE product_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        ",
    )
    .bind(product_id.as_i64())
    .bind(limit)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Movement::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_op_quantity() {
        assert_eq!(LedgerOp::Add(5).quantity(), 5);
        assert_eq!(LedgerOp::ConfirmSale(2).quantity(), 2);
    }

    #[test]
    fn test_ledger_op_dispatch() {
        let levels = StockLevels::new(10, 4);
        assert_eq!(
            LedgerOp::Add(2).apply_to(levels),
            Ok(StockLevels::new(12, 4))
        );
        assert_eq!(
            LedgerOp::Reduce(2).apply_to(levels),
            Ok(StockLevels::new(8, 4))
        );
        assert_eq!(
            LedgerOp::Reserve(2).apply_to(levels),
            Ok(StockLevels::new(10, 6))
        );
        assert_eq!(
            LedgerOp::Release(2).apply_to(levels),
            Ok(StockLevels::new(10, 2))
        );
        assert_eq!(
            LedgerOp::ConfirmSale(2).apply_to(levels),
            Ok(StockLevels::new(8, 2))
        );
    }
}
