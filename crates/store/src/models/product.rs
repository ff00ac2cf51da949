//! Catalog product snapshot.
//!
//! Catalog management is out of scope for this service; products exist here
//! so checkout can snapshot names and prices and so the ledger can seed a
//! missing inventory record from the legacy stock counter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tangelo_core::{CurrencyCode, ProductId};

/// A sellable product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Unit price in the store currency.
    pub unit_price: Decimal,
    pub currency: CurrencyCode,
    /// Stock counter carried over from before the ledger existed; used only
    /// to seed a missing inventory record.
    pub legacy_stock: i32,
    pub created_at: DateTime<Utc>,
}
