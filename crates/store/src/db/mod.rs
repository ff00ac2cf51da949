//! Database operations for the store `PostgreSQL` schema.
//!
//! # Tables (schema `store`)
//!
//! - `product` - catalog snapshot (name, price, legacy stock seed)
//! - `customer` - email-resolved customers
//! - `inventory_record` - per-product on-hand/reserved counters
//! - `inventory_movement` - append-only stock audit trail
//! - `customer_order` / `order_line` / `order_state_history` / `payment` -
//!   the order aggregate
//!
//! # Migrations
//!
//! Migrations are stored in `crates/store/migrations/` and run via:
//! ```bash
//! cargo run -p tangelo-cli -- migrate store
//! ```
//!
//! Queries are runtime-bound (`sqlx::query_as` + `bind`) so the workspace
//! builds without a live database; every row type is an internal struct
//! converted into the domain model at the module boundary.

pub mod customers;
pub mod inventory;
pub mod orders;
pub mod products;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation or concurrent state change.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
