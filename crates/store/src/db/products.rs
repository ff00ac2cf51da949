//! Product lookups.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tangelo_core::{CurrencyCode, ProductId};

use super::RepositoryError;
use crate::models::Product;

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    unit_price: Decimal,
    currency: String,
    legacy_stock: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            unit_price: row.unit_price,
            currency,
            legacy_stock: row.legacy_stock,
            created_at: row.created_at,
        })
    }
}

/// Get a product by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    executor: impl sqlx::PgExecutor<'_>,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(
        r"
        SELECT id, name, unit_price, currency, legacy_stock, created_at
        FROM store.product
        WHERE id = $1
        ",
    )
    .bind(id.as_i64())
    .fetch_optional(executor)
    .await?;

    row.map(Product::try_from).transpose()
}

