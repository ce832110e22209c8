pub mod checkout;
pub mod payments;
pub mod refunds;
pub mod wallet;
pub mod webhooks;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::extractors::Json;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The JSON API consumed by the checkout and dashboard collaborators.
pub fn api_router(rate: RateLimitConfig) -> Router<AppState> {
    // Checkout creation makes external gateway calls - strict tier.
    let checkout_routes = Router::new()
        .route("/checkout/paypal", post(checkout::create_paypal_checkout))
        .route("/checkout/mollie", post(checkout::create_mollie_checkout))
        .route(
            "/checkout/mollie/{payment_id}/cancel",
            post(checkout::cancel_mollie_checkout),
        )
        .layer(rate_limit::strict_layer(rate.strict_rpm));

    Router::new()
        .route("/health", get(health))
        .merge(checkout_routes)
        // Payment inspection and reconciliation
        .route("/payments/{payment_id}", get(payments::get_payment))
        .route("/payments/{payment_id}/sync", post(payments::sync_payment))
        // Wallet ledger
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
        // Refund workflow
        .route("/refunds", post(refunds::create_refund))
        .route("/refunds/account/{account_id}", get(refunds::list_refunds))
        .route(
            "/refunds/{request_id}",
            put(refunds::decide_refund).delete(refunds::cancel_refund),
        )
}
