//! Test utilities and fixtures for tally integration tests

#![allow(dead_code)]

use axum::routing::{delete, get, post, put};
use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use tally::db::{init_db, queries, AppState};
pub use tally::models::*;
pub use tally::payments::PaymentProvider;
pub use tally::retry::RetryPolicy;
pub use tally::settlement::{self, Applied, IntentStatus};

use tally::handlers::{payments, refunds, wallet, webhooks};

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create an AppState over a single-connection in-memory pool.
/// max_size(1) keeps every pool checkout on the same in-memory database.
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        base_url: "http://localhost:3000".to_string(),
        paypal: None,
        mollie: None,
        retry: RetryPolicy::default(),
    }
}

/// Create a Router with the API endpoints (without rate limiting for tests)
pub fn test_app(state: AppState) -> Router {
    Router::new()
        .route("/payments/{payment_id}", get(payments::get_payment))
        .route("/wallet/{account_id}", get(wallet::get_wallet))
        .route(
            "/wallet/{account_id}/transactions",
            post(wallet::create_transaction),
        )
        .route(
            "/wallet/transactions/{transaction_id}/status",
            put(wallet::update_transaction_status),
        )
        .route(
            "/wallet/transactions/{transaction_id}",
            delete(wallet::delete_transaction),
        )
        .route("/refunds", post(refunds::create_refund))
        .route("/refunds/account/{account_id}", get(refunds::list_refunds))
        .route(
            "/refunds/{request_id}",
            put(refunds::decide_refund).delete(refunds::cancel_refund),
        )
        .route(
            "/webhooks/paypal",
            post(webhooks::handle_paypal_webhook),
        )
        .route(
            "/webhooks/mollie",
            post(webhooks::handle_mollie_webhook),
        )
        .with_state(state)
}

/// Record a payment intent as checkout creation would.
pub fn create_test_intent(
    conn: &Connection,
    id: &str,
    provider: PaymentProvider,
    account_id: &str,
    correlation_id: &str,
    amount_cents: i64,
) -> PaymentIntent {
    queries::create_payment_intent(
        conn,
        &CreatePaymentIntent {
            id: id.to_string(),
            provider,
            account_id: account_id.to_string(),
            correlation_id: correlation_id.to_string(),
            amount_cents,
            currency: "EUR".to_string(),
            description: format!("Order {}", correlation_id),
            checkout_url: format!("https://checkout.example/{}", id),
        },
    )
    .expect("Failed to create test payment intent")
}

/// Append a ledger entry directly.
pub fn append_transaction(
    conn: &Connection,
    account_id: &str,
    kind: TransactionKind,
    amount_cents: i64,
    status: TransactionStatus,
    payment_method: Option<PaymentMethod>,
) -> WalletTransaction {
    queries::create_wallet_transaction(
        conn,
        &CreateWalletTransaction {
            account_id: account_id.to_string(),
            kind,
            amount_cents,
            description: "test entry".to_string(),
            status,
            payment_method,
            intent_id: None,
            refund_request_id: None,
        },
    )
    .expect("Failed to append test transaction")
}

/// File a refund request.
pub fn create_test_refund_request(
    conn: &Connection,
    account_id: &str,
    order_id: &str,
    amount_cents: i64,
) -> RefundRequest {
    queries::create_refund_request(
        conn,
        &CreateRefundRequest {
            account_id: account_id.to_string(),
            order_id: order_id.to_string(),
            amount_cents,
            reason: "Not as described".to_string(),
        },
    )
    .expect("Failed to create test refund request")
}
