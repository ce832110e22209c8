use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::payments::PaymentProvider;
use crate::retry::retry_with_backoff;
use crate::settlement;

use super::common::{received, settle, ReceivedResponse};

/// Mollie webhook bodies carry nothing but a payment ID.
#[derive(Debug, Deserialize)]
pub struct MollieWebhookBody {
    #[serde(default)]
    pub id: Option<String>,
}

/// POST /webhooks/mollie
///
/// Trust model: trust-on-fetch. The body carries no signature, so
/// authenticity is established by re-fetching the payment by ID with our
/// own credentials. The fetched representation is authoritative; the
/// webhook's claims about status or amount are never read.
pub async fn handle_mollie_webhook(
    State(state): State<AppState>,
    Json(body): Json<MollieWebhookBody>,
) -> Result<Json<ReceivedResponse>> {
    let payment_id = body
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Payment ID is required".into()))?;

    let client = state
        .mollie
        .clone()
        .ok_or_else(|| AppError::Internal("Mollie is not configured".into()))?;

    let payment = match retry_with_backoff(state.retry, || client.get_payment(&payment_id)).await {
        Ok(payment) => payment,
        // A 4xx on the re-fetch means Mollie does not know this payment:
        // the webhook was forged or garbage. 401 gives it no retry incentive.
        Err(AppError::Gateway {
            http_status: Some(status),
            ..
        }) if (400..500).contains(&status) => {
            tracing::warn!(
                "Rejected Mollie webhook: payment {} could not be verified",
                payment_id
            );
            return Err(AppError::Verification("Payment verification failed".into()));
        }
        Err(e) => return Err(e),
    };

    let Some(observed) = settlement::from_mollie_status(&payment.status) else {
        tracing::debug!(
            "Ignoring Mollie payment {} with status {}",
            payment.id,
            payment.status
        );
        return Ok(received());
    };

    // Mollie sends no event ID; the dedupe key is (payment, fetched
    // status). Ledger idempotency does not depend on it - the forward-only
    // transition and the unique credit index hold regardless.
    let event_key = format!("{}:{}", payment.id, payment.status);

    match settle(
        &state,
        PaymentProvider::Mollie,
        Some(&event_key),
        &payment.id,
        observed,
        None,
    ) {
        Ok(_) => Ok(received()),
        Err(AppError::NotFound(_)) => {
            tracing::warn!("Mollie payment {} matches no payment intent", payment.id);
            Ok(received())
        }
        Err(e) => Err(e),
    }
}
