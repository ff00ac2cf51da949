//! Abandoned-order reaper.
//!
//! Buyers who never come back from the hosted checkout leave a pending
//! order holding a reservation. A periodic task, independent of the request
//! path, finds pending asynchronous orders older than the configured age,
//! gives their reservations back, and deletes them. Each order is processed
//! in its own transaction; one failure never aborts the batch.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tangelo_core::{MovementKind, OrderId, OrderStatus};
use tracing::{debug, error, info};

use crate::db::inventory::{self, InventoryError, LedgerOp};
use crate::db::orders;
use crate::state::AppState;

/// Start the reaper on its own timer.
///
/// Runs until the process shuts down. The first sweep happens one full
/// interval after startup.
pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(state))
}

async fn run(state: AppState) {
    let schedule = state.config().reaper;
    let mut ticker = tokio::time::interval(schedule.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // interval fires immediately; consume that so startup isn't a sweep
    ticker.tick().await;

    info!(
        interval_secs = schedule.interval.as_secs(),
        max_age_secs = schedule.max_age.as_secs(),
        "abandoned-order reaper started"
    );

    loop {
        ticker.tick().await;
        match reap_abandoned_orders(state.pool(), schedule.max_age).await {
            Ok(0) => debug!("reaper sweep found nothing to collect"),
            Ok(reaped) => info!(reaped, "reaper sweep complete"),
            Err(e) => error!(error = %e, "reaper sweep failed"),
        }
    }
}

/// One sweep: release and delete every abandoned pending order.
///
/// Returns how many orders were collected. Per-order failures are logged
/// and skipped.
///
/// # Errors
///
/// Returns an error only if the candidate query itself fails.
pub async fn reap_abandoned_orders(
    pool: &PgPool,
    max_age: Duration,
) -> Result<usize, InventoryError> {
    let cutoff = Utc::now()
        - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::hours(1));
    let candidates = orders::find_abandoned(pool, cutoff).await?;

    let mut reaped = 0;
    for order_id in candidates {
        match reap_order(pool, order_id).await {
            Ok(true) => reaped += 1,
            Ok(false) => {}
            Err(e) => {
                error!(order_id = %order_id, error = %e, "failed to reap order; continuing");
            }
        }
    }

    Ok(reaped)
}

/// Collect a single order: release its reservations, then delete it (lines
/// and history cascade).
///
/// Returns `false` when the order was already gone or a webhook settled it
/// between the candidate query and the lock.
async fn reap_order(pool: &PgPool, order_id: OrderId) -> Result<bool, InventoryError> {
    let mut tx = pool.begin().await?;

    let Some(order) = orders::lock(&mut tx, order_id).await? else {
        return Ok(false);
    };
    // Re-check under the lock: a webhook may have raced the sweep.
    if order.status != OrderStatus::Pending || !order.payment_method.is_asynchronous() {
        return Ok(false);
    }

    let lines = orders::lines(&mut *tx, order_id).await?;
    for line in &lines {
        inventory::apply(
            &mut tx,
            line.product_id,
            None,
            LedgerOp::Release(line.quantity),
            MovementKind::Adjust,
            &format!("reservation released for abandoned order {}", order.order_number),
        )
        .await?;
    }

    orders::delete(&mut tx, order_id).await?;
    tx.commit().await?;

    info!(order = %order.order_number, lines = lines.len(), "abandoned order reaped");
    Ok(true)
}
