//! Payment dispatcher behavior that is observable without a gateway on the
//! wire: the locally settled methods, the card token requirement, and the
//! order-id requirement of the redirect flow.

use std::time::Duration;

use secrecy::SecretString;
use tangelo_core::{CurrencyCode, Money, PaymentMethod, PaymentStatus};
use tangelo_store::config::{
    CardGatewayConfig, CheckoutGatewayConfig, ReaperConfig, StoreConfig,
};
use tangelo_store::services::payments::{PaymentDispatcher, PaymentError, PaymentIntent};

fn test_config() -> StoreConfig {
    StoreConfig {
        database_url: SecretString::from("postgres://localhost/tangelo_test"),
        host: "127.0.0.1".parse().expect("valid addr"),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        currency: CurrencyCode::USD,
        card_gateway: CardGatewayConfig {
            base_url: "http://localhost:9/charges-api".to_string(),
            api_key: SecretString::from("test-key"),
        },
        checkout_gateway: CheckoutGatewayConfig {
            base_url: "http://localhost:9/hosted".to_string(),
            access_token: SecretString::from("test-token"),
        },
        reaper: ReaperConfig {
            interval: Duration::from_secs(1800),
            max_age: Duration::from_secs(3600),
        },
        smtp: None,
        sentry_dsn: None,
    }
}

fn intent(config: &StoreConfig) -> PaymentIntent<'static> {
    PaymentIntent {
        description: "Order ORD-20260315-TEST01".to_string(),
        amount: Money::new(rust_decimal_from_cents(4200), config.currency),
        card_token: None,
        order: None,
        items: Vec::new(),
    }
}

fn rust_decimal_from_cents(cents: i64) -> rust_decimal::Decimal {
    rust_decimal::Decimal::new(cents, 2)
}

#[tokio::test]
async fn test_transfer_settles_immediately() {
    let config = test_config();
    let dispatcher = PaymentDispatcher::new(&config).expect("dispatcher builds");

    let outcome = dispatcher
        .process(intent(&config), PaymentMethod::Transfer)
        .await
        .expect("transfer approves locally");

    assert!(outcome.approved);
    assert!(!outcome.requires_redirect);
    assert_eq!(outcome.status, PaymentStatus::Approved);
    assert!(outcome.external_id.expect("reference").starts_with("TRF-"));
}

#[tokio::test]
async fn test_cash_on_delivery_settles_immediately() {
    let config = test_config();
    let dispatcher = PaymentDispatcher::new(&config).expect("dispatcher builds");

    let outcome = dispatcher
        .process(intent(&config), PaymentMethod::CashOnDelivery)
        .await
        .expect("cash on delivery approves locally");

    assert!(outcome.approved);
    assert!(outcome.redirect_url.is_none());
    assert!(outcome.external_id.expect("reference").starts_with("COD-"));
}

#[tokio::test]
async fn test_card_without_token_is_declined() {
    let config = test_config();
    let dispatcher = PaymentDispatcher::new(&config).expect("dispatcher builds");

    let err = dispatcher
        .process(intent(&config), PaymentMethod::Card)
        .await
        .expect_err("card needs a token");

    assert!(matches!(err, PaymentError::Declined(_)));
}

#[tokio::test]
async fn test_redirect_without_order_is_a_gateway_error() {
    let config = test_config();
    let dispatcher = PaymentDispatcher::new(&config).expect("dispatcher builds");

    // The redirect flow must embed a persisted order id; dispatching one
    // without an order is a contract violation, not a decline.
    let err = dispatcher
        .process(intent(&config), PaymentMethod::Gateway)
        .await
        .expect_err("redirect needs an order");

    assert!(matches!(err, PaymentError::Gateway(_)));
}
