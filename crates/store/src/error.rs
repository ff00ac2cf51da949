//! Unified error handling for the store service.
//!
//! Business failures (stock violations, declined payments) are structured
//! results the caller can branch on, not bare 5xx responses: every error
//! renders as JSON with a stable `code` and a human-readable `message`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tangelo_core::LedgerError;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::inventory::InventoryError;
use crate::services::checkout::CheckoutError;

/// Application-level error type for the store.
#[derive(Debug, Error)]
pub enum AppError {
    /// Checkout or buyer-return failure.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Inventory ledger failure (manual adjustment path).
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Database operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl AppError {
    /// Stable machine-readable code plus HTTP status.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Checkout(CheckoutError::Ledger(e)) | Self::Inventory(InventoryError::Ledger(e)) => {
                (StatusCode::CONFLICT, ledger_code(*e))
            }
            Self::Checkout(CheckoutError::ProductNotFound(_)) => {
                (StatusCode::NOT_FOUND, "product_not_found")
            }
            Self::Checkout(CheckoutError::OrderNotFound) | Self::NotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Self::Checkout(CheckoutError::PaymentDeclined(_)) => {
                (StatusCode::PAYMENT_REQUIRED, "payment_declined")
            }
            Self::Checkout(CheckoutError::GatewayUnavailable(_)) => {
                (StatusCode::BAD_GATEWAY, "gateway_unavailable")
            }
            Self::Checkout(CheckoutError::Repository(RepositoryError::Conflict(_)))
            | Self::Repository(RepositoryError::Conflict(_))
            | Self::Inventory(InventoryError::Repository(RepositoryError::Conflict(_))) => {
                (StatusCode::CONFLICT, "conflict")
            }
            Self::Checkout(CheckoutError::Repository(_))
            | Self::Repository(_)
            | Self::Inventory(InventoryError::Repository(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }
}

const fn ledger_code(e: LedgerError) -> &'static str {
    match e {
        LedgerError::InvalidQuantity(_) => "invalid_quantity",
        LedgerError::InsufficientStock { .. } => "insufficient_stock",
        LedgerError::InsufficientAvailable { .. } => "insufficient_available",
        LedgerError::InsufficientReserved { .. } => "insufficient_reserved",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        // Log server errors with Sentry; client-correctable failures are
        // normal traffic.
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "store request error"
            );
        }

        // Don't expose internal error details to clients.
        let message = if code == "internal" {
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { code, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_failures_are_conflicts() {
        let err = AppError::Checkout(CheckoutError::Ledger(LedgerError::InsufficientStock {
            on_hand: 1,
            requested: 2,
        }));
        assert_eq!(
            err.classify(),
            (StatusCode::CONFLICT, "insufficient_stock")
        );

        let err = AppError::Checkout(CheckoutError::Ledger(LedgerError::InsufficientAvailable {
            available: 0,
            requested: 1,
        }));
        assert_eq!(
            err.classify(),
            (StatusCode::CONFLICT, "insufficient_available")
        );
    }

    #[test]
    fn test_payment_failures_are_distinguishable() {
        let declined = AppError::Checkout(CheckoutError::PaymentDeclined("no funds".to_string()));
        assert_eq!(
            declined.classify(),
            (StatusCode::PAYMENT_REQUIRED, "payment_declined")
        );

        let gateway =
            AppError::Checkout(CheckoutError::GatewayUnavailable("timeout".to_string()));
        assert_eq!(
            gateway.classify(),
            (StatusCode::BAD_GATEWAY, "gateway_unavailable")
        );
    }

    #[test]
    fn test_ownership_mismatch_reads_as_not_found() {
        let err = AppError::Checkout(CheckoutError::OrderNotFound);
        assert_eq!(err.classify(), (StatusCode::NOT_FOUND, "not_found"));
    }

    #[test]
    fn test_database_errors_are_internal() {
        let err = AppError::Repository(RepositoryError::DataCorruption("bad row".to_string()));
        assert_eq!(
            err.classify(),
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        );
    }
}
