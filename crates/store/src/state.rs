//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::config::StoreConfig;
use crate::services::mailer::Mailer;
use crate::services::payments::{PaymentDispatcher, PaymentError};

/// Error creating application state.
#[derive(Debug, Error)]
pub enum StateInitError {
    #[error("payment gateway setup failed: {0}")]
    Payments(#[from] PaymentError),
    #[error("mailer setup failed: {0}")]
    Mailer(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; holds the configuration, the database pool,
/// the payment gateway clients, and the optional mailer.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StoreConfig,
    pool: PgPool,
    payments: PaymentDispatcher,
    mailer: Option<Mailer>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if a gateway client or the mailer cannot be built.
    pub fn new(config: StoreConfig, pool: PgPool) -> Result<Self, StateInitError> {
        let payments = PaymentDispatcher::new(&config)?;
        let mailer = config.smtp.as_ref().map(Mailer::new).transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payments,
                mailer,
            }),
        })
    }

    /// Get a reference to the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the payment dispatcher.
    #[must_use]
    pub fn payments(&self) -> &PaymentDispatcher {
        &self.inner.payments
    }

    /// Get a reference to the mailer, if configured.
    #[must_use]
    pub fn mailer(&self) -> Option<&Mailer> {
        self.inner.mailer.as_ref()
    }
}
