//! Seed the catalog with sample products.

use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur during seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Required environment variable is missing.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Sample catalog: name, price in cents, starting stock.
const SAMPLE_PRODUCTS: &[(&str, i64, i32)] = &[
    ("Ceramic Mug", 2500, 40),
    ("Walnut Cutting Board", 6800, 15),
    ("Linen Apron", 4200, 25),
    ("Olive Wood Spoon Set", 1900, 60),
    ("Cast Iron Trivet", 3300, 10),
];

/// Insert the sample products, skipping any name that already exists.
///
/// # Errors
///
/// Returns `SeedError` if the database is unreachable or an insert fails.
pub async fn run() -> Result<(), SeedError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STORE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| SeedError::MissingEnvVar("STORE_DATABASE_URL"))?;

    let pool = PgPool::connect(&database_url).await?;

    for &(name, price_cents, stock) in SAMPLE_PRODUCTS {
        let inserted = sqlx::query(
            r"
            INSERT INTO store.product (name, unit_price, currency, legacy_stock)
            SELECT $1, $2, 'USD', $3
            WHERE NOT EXISTS (SELECT 1 FROM store.product WHERE name = $1)
            ",
        )
        .bind(name)
        .bind(Decimal::new(price_cents, 2))
        .bind(stock)
        .execute(&pool)
        .await?;

        if inserted.rows_affected() > 0 {
            tracing::info!(product = name, stock, "seeded product");
        } else {
            tracing::info!(product = name, "already present, skipping");
        }
    }

    tracing::info!("Seeding complete!");
    Ok(())
}
