//! Database operations for the order aggregate.
//!
//! State-changing functions take `&mut PgConnection` so services can compose
//! them with ledger operations in a single transaction; plain reads take any
//! executor.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tangelo_core::{
    CurrencyCode, CustomerId, OrderId, OrderLineId, OrderStatus, PaymentMethod, PaymentStatus,
    ProductId,
};

use super::RepositoryError;
use crate::models::{NewOrder, Order, OrderLine, PaymentRecord, StateTransition};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    customer_id: i64,
    status: String,
    payment_status: String,
    payment_method: String,
    external_payment_id: Option<String>,
    subtotal: Decimal,
    total: Decimal,
    currency: String,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let corrupted = |e: String| RepositoryError::DataCorruption(format!("order {}: {e}", row.id));

        Ok(Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            customer_id: CustomerId::new(row.customer_id),
            status: row.status.parse::<OrderStatus>().map_err(corrupted)?,
            payment_status: row
                .payment_status
                .parse::<PaymentStatus>()
                .map_err(corrupted)?,
            payment_method: row
                .payment_method
                .parse::<PaymentMethod>()
                .map_err(corrupted)?,
            external_payment_id: row.external_payment_id,
            subtotal: row.subtotal,
            total: row.total,
            currency: row.currency.parse::<CurrencyCode>().map_err(corrupted)?,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for order line queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    product_name: String,
    variant: Option<serde_json::Value>,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: OrderLineId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            variant: row.variant,
            quantity: row.quantity,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
        }
    }
}

/// Internal row type for state history queries.
#[derive(Debug, sqlx::FromRow)]
struct StateTransitionRow {
    order_id: i64,
    previous_status: Option<String>,
    new_status: String,
    changed_at: DateTime<Utc>,
}

impl TryFrom<StateTransitionRow> for StateTransition {
    type Error = RepositoryError;

    fn try_from(row: StateTransitionRow) -> Result<Self, Self::Error> {
        let corrupted =
            |e: String| RepositoryError::DataCorruption(format!("order {}: {e}", row.order_id));

        Ok(Self {
            order_id: OrderId::new(row.order_id),
            previous: row
                .previous_status
                .map(|s| s.parse::<OrderStatus>())
                .transpose()
                .map_err(corrupted)?,
            next: row.new_status.parse::<OrderStatus>().map_err(corrupted)?,
            changed_at: row.changed_at,
        })
    }
}

/// Internal row type for payment queries.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    order_id: i64,
    amount: Decimal,
    method: String,
    status: String,
    external_payment_id: Option<String>,
    gateway_reference: Option<String>,
    card_brand: Option<String>,
    card_last4: Option<String>,
    raw_payload: Option<serde_json::Value>,
    paid_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let corrupted =
            |e: String| RepositoryError::DataCorruption(format!("payment {}: {e}", row.order_id));

        Ok(Self {
            order_id: OrderId::new(row.order_id),
            amount: row.amount,
            method: row.method.parse::<PaymentMethod>().map_err(corrupted)?,
            status: row.status.parse::<PaymentStatus>().map_err(corrupted)?,
            external_payment_id: row.external_payment_id,
            gateway_reference: row.gateway_reference,
            card_brand: row.card_brand,
            card_last4: row.card_last4,
            raw_payload: row.raw_payload,
            paid_at: row.paid_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Input for creating or updating an order's payment record.
#[derive(Debug, Clone)]
pub struct PaymentUpsert {
    pub order_id: OrderId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub external_payment_id: Option<String>,
    pub gateway_reference: Option<String>,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    pub raw_payload: Option<serde_json::Value>,
    pub paid_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Operations
// =============================================================================

/// Create an order with its lines and the creation history entry.
///
/// The order starts in `Pending`/`Pending`; callers advance it with
/// [`transition`] and [`set_payment_status`] inside the same transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order number collides.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn create(conn: &mut PgConnection, new: &NewOrder) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r"
        INSERT INTO store.customer_order
            (order_number, customer_id, status, payment_status, payment_method,
             external_payment_id, subtotal, total, currency)
        VALUES ($1, $2, 'pending', 'pending', $3, $4, $5, $6, $7)
        RETURNING id, order_number, customer_id, status, payment_status,
                  payment_method, external_payment_id, subtotal, total,
                  currency, paid_at, created_at
        ",
    )
    .bind(&new.order_number)
    .bind(new.customer_id.as_i64())
    .bind(new.payment_method.to_string())
    .bind(new.external_payment_id.as_deref())
    .bind(new.subtotal)
    .bind(new.total)
    .bind(new.currency.code())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.constraint() == Some("customer_order_order_number_key")
        {
            return RepositoryError::Conflict("order number already exists".to_string());
        }
        RepositoryError::Database(e)
    })?;

    let order: Order = row.try_into()?;

    for line in &new.lines {
        sqlx::query(
            r"
            INSERT INTO store.order_line
                (order_id, product_id, product_name, variant, quantity, unit_price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(order.id.as_i64())
        .bind(line.product_id.as_i64())
        .bind(&line.product_name)
        .bind(line.variant.as_ref())
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.subtotal)
        .execute(&mut *conn)
        .await?;
    }

    // Creation entry: previous state is NULL.
    sqlx::query(
        r"
        INSERT INTO store.order_state_history (order_id, previous_status, new_status)
        VALUES ($1, NULL, 'pending')
        ",
    )
    .bind(order.id.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(order)
}

/// Get an order by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    executor: impl sqlx::PgExecutor<'_>,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r"
        SELECT id, order_number, customer_id, status, payment_status,
               payment_method, external_payment_id, subtotal, total,
               currency, paid_at, created_at
        FROM store.customer_order
        WHERE id = $1
        ",
    )
    .bind(id.as_i64())
    .fetch_optional(executor)
    .await?;

    row.map(Order::try_from).transpose()
}

/// Lock an order row for the remainder of the transaction.
///
/// Concurrent webhook deliveries (and the reaper) serialize here, so the
/// idempotency check always sees the latest committed payment state.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r"
        SELECT id, order_number, customer_id, status, payment_status,
               payment_method, external_payment_id, subtotal, total,
               currency, paid_at, created_at
        FROM store.customer_order
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(id.as_i64())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Order::try_from).transpose()
}

/// Find the order a gateway notification refers to and lock it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_external_payment_id(
    conn: &mut PgConnection,
    external_payment_id: &str,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r"
        SELECT id, order_number, customer_id, status, payment_status,
               payment_method, external_payment_id, subtotal, total,
               currency, paid_at, created_at
        FROM store.customer_order
        WHERE external_payment_id = $1
        FOR UPDATE
        ",
    )
    .bind(external_payment_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Order::try_from).transpose()
}

/// Lines of an order, in insertion order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines(
    executor: impl sqlx::PgExecutor<'_>,
    order_id: OrderId,
) -> Result<Vec<OrderLine>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderLineRow>(
        r"
        SELECT id, order_id, product_id, product_name, variant,
               quantity, unit_price, subtotal
        FROM store.order_line
        WHERE order_id = $1
        ORDER BY id ASC
        ",
    )
    .bind(order_id.as_i64())
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// State history of an order, oldest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn history(
    executor: impl sqlx::PgExecutor<'_>,
    order_id: OrderId,
) -> Result<Vec<StateTransition>, RepositoryError> {
    let rows = sqlx::query_as::<_, StateTransitionRow>(
        r"
        SELECT order_id, previous_status, new_status, changed_at
        FROM store.order_state_history
        WHERE order_id = $1
        ORDER BY changed_at ASC, id ASC
        ",
    )
    .bind(order_id.as_i64())
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(StateTransition::try_from).collect()
}

/// The order's payment record, if any.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn payment(
    executor: impl sqlx::PgExecutor<'_>,
    order_id: OrderId,
) -> Result<Option<PaymentRecord>, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentRow>(
        r"
        SELECT order_id, amount, method, status, external_payment_id,
               gateway_reference, card_brand, card_last4, raw_payload,
               paid_at, updated_at
        FROM store.payment
        WHERE order_id = $1
        ",
    )
    .bind(order_id.as_i64())
    .fetch_optional(executor)
    .await?;

    row.map(PaymentRecord::try_from).transpose()
}

/// Move an order from one state to another, appending a history entry.
///
/// The UPDATE is guarded on the expected current state; losing that race
/// surfaces as `Conflict` and aborts the enclosing transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order is no longer in `from`.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn transition(
    conn: &mut PgConnection,
    order_id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE store.customer_order
        SET status = $3
        WHERE id = $1 AND status = $2
        ",
    )
    .bind(order_id.as_i64())
    .bind(from.to_string())
    .bind(to.to_string())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "order {order_id} is no longer {from}"
        )));
    }

    sqlx::query(
        r"
        INSERT INTO store.order_state_history (order_id, previous_status, new_status)
        VALUES ($1, $2, $3)
        ",
    )
    .bind(order_id.as_i64())
    .bind(from.to_string())
    .bind(to.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Update the order's payment columns.
///
/// `external_payment_id` and `paid_at` are only written when provided.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_payment_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: PaymentStatus,
    external_payment_id: Option<&str>,
    paid_at: Option<DateTime<Utc>>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE store.customer_order
        SET payment_status = $2,
            external_payment_id = COALESCE($3, external_payment_id),
            paid_at = COALESCE($4, paid_at)
        WHERE id = $1
        ",
    )
    .bind(order_id.as_i64())
    .bind(status.to_string())
    .bind(external_payment_id)
    .bind(paid_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Create or update the order's payment record.
///
/// Card snapshots are kept once written; later upserts (webhook updates)
/// only overwrite them when they carry values.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn upsert_payment(
    conn: &mut PgConnection,
    input: &PaymentUpsert,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO store.payment
            (order_id, amount, method, status, external_payment_id,
             gateway_reference, card_brand, card_last4, raw_payload, paid_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (order_id) DO UPDATE SET
            status = EXCLUDED.status,
            external_payment_id = COALESCE(EXCLUDED.external_payment_id, store.payment.external_payment_id),
            gateway_reference = COALESCE(EXCLUDED.gateway_reference, store.payment.gateway_reference),
            card_brand = COALESCE(EXCLUDED.card_brand, store.payment.card_brand),
            card_last4 = COALESCE(EXCLUDED.card_last4, store.payment.card_last4),
            raw_payload = COALESCE(EXCLUDED.raw_payload, store.payment.raw_payload),
            paid_at = COALESCE(EXCLUDED.paid_at, store.payment.paid_at),
            updated_at = now()
        ",
    )
    .bind(input.order_id.as_i64())
    .bind(input.amount)
    .bind(input.method.to_string())
    .bind(input.status.to_string())
    .bind(input.external_payment_id.as_deref())
    .bind(input.gateway_reference.as_deref())
    .bind(input.card_brand.as_deref())
    .bind(input.card_last4.as_deref())
    .bind(input.raw_payload.as_ref())
    .bind(input.paid_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Pending asynchronous orders created before the cutoff (reaper input).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_abandoned(
    executor: impl sqlx::PgExecutor<'_>,
    created_before: DateTime<Utc>,
) -> Result<Vec<OrderId>, RepositoryError> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        r"
        SELECT id
        FROM store.customer_order
        WHERE status = 'pending'
          AND payment_method = 'gateway'
          AND created_at < $1
        ORDER BY created_at ASC
        ",
    )
    .bind(created_before)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|(id,)| OrderId::new(id)).collect())
}

/// Hard-delete an order; lines, history, and payment cascade.
///
/// Only the reaper calls this, and only for abandoned pending orders.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete(conn: &mut PgConnection, order_id: OrderId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        DELETE FROM store.customer_order
        WHERE id = $1
        ",
    )
    .bind(order_id.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(())
}
