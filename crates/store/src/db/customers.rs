//! Customer lookups.
//!
//! Authentication is out of scope; the store only resolves an email to a
//! stable customer id, creating the row lazily on first contact.

use chrono::{DateTime, Utc};
use tangelo_core::{CustomerId, Email};

use super::RepositoryError;
use crate::models::Customer;

/// Internal row type for customer queries.
#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    email: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            email,
            created_at: row.created_at,
        })
    }
}

/// Resolve an email to a customer, creating the row if absent.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_or_create(
    executor: impl sqlx::PgExecutor<'_>,
    email: &Email,
) -> Result<Customer, RepositoryError> {
    // The no-op DO UPDATE makes RETURNING yield the existing row on conflict.
    let row = sqlx::query_as::<_, CustomerRow>(
        r"
        INSERT INTO store.customer (email)
        VALUES ($1)
        ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
        RETURNING id, email, created_at
        ",
    )
    .bind(email.as_str())
    .fetch_one(executor)
    .await?;

    row.try_into()
}

/// Find a customer by email.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_email(
    executor: impl sqlx::PgExecutor<'_>,
    email: &Email,
) -> Result<Option<Customer>, RepositoryError> {
    let row = sqlx::query_as::<_, CustomerRow>(
        r"
        SELECT id, email, created_at
        FROM store.customer
        WHERE email = $1
        ",
    )
    .bind(email.as_str())
    .fetch_optional(executor)
    .await?;

    row.map(Customer::try_from).transpose()
}

/// Get a customer by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    executor: impl sqlx::PgExecutor<'_>,
    id: CustomerId,
) -> Result<Option<Customer>, RepositoryError> {
    let row = sqlx::query_as::<_, CustomerRow>(
        r"
        SELECT id, email, created_at
        FROM store.customer
        WHERE id = $1
        ",
    )
    .bind(id.as_i64())
    .fetch_optional(executor)
    .await?;

    row.map(Customer::try_from).transpose()
}
