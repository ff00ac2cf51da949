//! Store configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STORE_DATABASE_URL` - `PostgreSQL` connection string
//! - `STORE_BASE_URL` - Public URL for the store (gateway return URLs)
//! - `CARD_GATEWAY_URL` - Base URL of the synchronous charge gateway
//! - `CARD_GATEWAY_API_KEY` - API key for the charge gateway
//! - `CHECKOUT_GATEWAY_URL` - Base URL of the redirect (hosted checkout) gateway
//! - `CHECKOUT_GATEWAY_ACCESS_TOKEN` - Access token for the redirect gateway
//!
//! ## Optional
//! - `STORE_HOST` - Bind address (default: 127.0.0.1)
//! - `STORE_PORT` - Listen port (default: 3000)
//! - `STORE_CURRENCY` - ISO 4217 currency code (default: USD)
//! - `REAPER_INTERVAL_SECS` - Abandoned-order sweep interval (default: 1800)
//! - `REAPER_MAX_AGE_SECS` - Age before a pending order is abandoned (default: 3600)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`,
//!   `SMTP_FROM_ADDRESS` - order-confirmation mailer (disabled when unset)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use tangelo_core::CurrencyCode;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Store application configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the store
    pub base_url: String,
    /// Currency all prices are quoted in
    pub currency: CurrencyCode,
    /// Synchronous charge gateway
    pub card_gateway: CardGatewayConfig,
    /// Redirect-based hosted checkout gateway
    pub checkout_gateway: CheckoutGatewayConfig,
    /// Abandoned-order reaper schedule
    pub reaper: ReaperConfig,
    /// Order-confirmation mailer; `None` disables sending
    pub smtp: Option<SmtpConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Synchronous charge gateway configuration.
#[derive(Debug, Clone)]
pub struct CardGatewayConfig {
    /// Base URL of the charge API
    pub base_url: String,
    /// API key sent as a bearer token
    pub api_key: SecretString,
}

/// Redirect gateway (hosted checkout) configuration.
#[derive(Debug, Clone)]
pub struct CheckoutGatewayConfig {
    /// Base URL of the preference/status API
    pub base_url: String,
    /// Access token sent as a bearer token
    pub access_token: SecretString,
}

/// Abandoned-order reaper schedule.
#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    /// How often the sweep runs.
    pub interval: Duration,
    /// How old a pending asynchronous order must be before it is reaped.
    pub max_age: Duration,
}

/// SMTP mailer configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STORE_DATABASE_URL")?;
        let host = parse_env("STORE_HOST", "127.0.0.1")?;
        let port = parse_env("STORE_PORT", "3000")?;
        let base_url = get_required_env("STORE_BASE_URL")?;
        let currency = get_env_or_default("STORE_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("STORE_CURRENCY".to_string(), e))?;

        let card_gateway = CardGatewayConfig {
            base_url: get_required_env("CARD_GATEWAY_URL")?,
            api_key: get_required_secret("CARD_GATEWAY_API_KEY")?,
        };
        let checkout_gateway = CheckoutGatewayConfig {
            base_url: get_required_env("CHECKOUT_GATEWAY_URL")?,
            access_token: get_required_secret("CHECKOUT_GATEWAY_ACCESS_TOKEN")?,
        };

        let reaper = ReaperConfig {
            interval: Duration::from_secs(parse_env("REAPER_INTERVAL_SECS", "1800")?),
            max_age: Duration::from_secs(parse_env("REAPER_MAX_AGE_SECS", "3600")?),
        };

        let smtp = SmtpConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            currency,
            card_gateway,
            checkout_gateway,
            reaper,
            smtp,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SmtpConfig {
    /// The mailer is optional: it is configured only when `SMTP_HOST` is set,
    /// at which point the remaining SMTP variables become required.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            host,
            port: parse_env("SMTP_PORT", "587")?,
            username: get_required_env("SMTP_USERNAME")?,
            password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM_ADDRESS")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (with default) into a typed value.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = StoreConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            currency: CurrencyCode::USD,
            card_gateway: CardGatewayConfig {
                base_url: "https://charges.test".to_string(),
                api_key: SecretString::from("k"),
            },
            checkout_gateway: CheckoutGatewayConfig {
                base_url: "https://hosted.test".to_string(),
                access_token: SecretString::from("t"),
            },
            reaper: ReaperConfig {
                interval: Duration::from_secs(1800),
                max_age: Duration::from_secs(3600),
            },
            smtp: None,
            sentry_dsn: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let gateway = CardGatewayConfig {
            base_url: "https://charges.test".to_string(),
            api_key: SecretString::from("super_secret_api_key"),
        };

        let debug_output = format!("{gateway:?}");
        assert!(debug_output.contains("charges.test"));
        assert!(!debug_output.contains("super_secret_api_key"));
    }
}
