pub mod common;
pub mod mollie;
pub mod paypal;

pub use mollie::handle_mollie_webhook;
pub use paypal::handle_paypal_webhook;

use axum::{routing::post, Router};

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit;

pub fn router(rate: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .route("/webhooks/paypal", post(handle_paypal_webhook))
        .route("/webhooks/mollie", post(handle_mollie_webhook))
        .layer(rate_limit::standard_layer(rate.standard_rpm))
}
