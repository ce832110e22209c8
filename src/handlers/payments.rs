use axum::extract::State;
use serde::Deserialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, OptionExt, Result};
use crate::extractors::{ApiResponse, Json, Path};
use crate::models::PaymentIntent;
use crate::payments::PaymentProvider;
use crate::retry::retry_with_backoff;
use crate::settlement;

use super::webhooks::common::settle;

#[derive(Debug, Deserialize)]
pub struct PaymentPath {
    pub payment_id: String,
}

/// GET /payments/{payment_id}
///
/// Read-only intent inspection for collaborators (invoice rendering,
/// dashboards). They read settled state here; they never write it.
pub async fn get_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
) -> Result<Json<ApiResponse<PaymentIntent>>> {
    let conn = state.db.get()?;
    let intent =
        queries::get_payment_intent(&conn, &path.payment_id)?.or_not_found("Payment not found")?;
    Ok(ApiResponse::ok(intent))
}

/// POST /payments/{payment_id}/sync
///
/// Reconciliation pass: re-fetch the provider's current state and feed it
/// through the regular settlement path. Picks up intents orphaned by a
/// caller-side timeout or a missed webhook; safe to call any number of
/// times because settlement only ever moves forward.
pub async fn sync_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
) -> Result<Json<ApiResponse<PaymentIntent>>> {
    let intent = {
        let conn = state.db.get()?;
        queries::get_payment_intent(&conn, &path.payment_id)?.or_not_found("Payment not found")?
    };

    let observed = match intent.provider {
        PaymentProvider::Paypal => {
            let client = state
                .paypal
                .clone()
                .ok_or_else(|| AppError::Internal("PayPal is not configured".into()))?;
            let order = retry_with_backoff(state.retry, || client.get_order(&intent.id)).await?;
            settlement::from_paypal_order_status(&order.status)
        }
        PaymentProvider::Mollie => {
            let client = state
                .mollie
                .clone()
                .ok_or_else(|| AppError::Internal("Mollie is not configured".into()))?;
            let payment =
                retry_with_backoff(state.retry, || client.get_payment(&intent.id)).await?;
            settlement::from_mollie_status(&payment.status)
        }
    };

    if let Some(observed) = observed {
        settle(&state, intent.provider, None, &intent.id, observed, None)?;
    }

    let conn = state.db.get()?;
    let refreshed =
        queries::get_payment_intent(&conn, &intent.id)?.or_not_found("Payment not found")?;
    Ok(ApiResponse::ok(refreshed))
}
