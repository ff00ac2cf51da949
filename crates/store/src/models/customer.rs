//! Store customer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tangelo_core::{CustomerId, Email};

/// A customer resolved from an email address.
///
/// Authentication lives elsewhere; orders only need a stable customer id.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub created_at: DateTime<Utc>,
}
